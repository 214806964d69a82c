//! Canonical facade keys and their per-generation module descriptors.
//!
//! Resolution order is declaration order; the first key that cannot be
//! resolved aborts the build.

use crate::registry::{ExportPath, Generation, ModuleDescriptor, Predicate, Selector};

/// How one facade key is assembled from modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A single module export.
    One(ModuleDescriptor),
    /// Candidates tried in order; the first that resolves is bound.
    FirstOf(&'static [ModuleDescriptor]),
    /// Every constituent must resolve; the binding merges all of them.
    Union(&'static [ModuleDescriptor]),
}

impl Resolution {
    pub fn descriptors(&self) -> &[ModuleDescriptor] {
        match self {
            Resolution::One(descriptor) => std::slice::from_ref(descriptor),
            Resolution::FirstOf(all) | Resolution::Union(all) => all,
        }
    }
}

/// A canonical facade key declared once for both generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacadeKey {
    pub name: &'static str,
    pub legacy: Resolution,
    pub modern: Resolution,
}

impl FacadeKey {
    pub fn resolution(&self, generation: Generation) -> &Resolution {
        match generation {
            Generation::Legacy => &self.legacy,
            Generation::Modern => &self.modern,
        }
    }
}

const fn collection(name: &'static str) -> FacadeKey {
    FacadeKey {
        name,
        legacy: Resolution::One(ModuleDescriptor::new(
            Selector::Match(Predicate::DefaultHas(name)),
            ExportPath::DefaultNamed(name),
        )),
        modern: Resolution::One(ModuleDescriptor::new(
            Selector::Id("WAWebCollections"),
            ExportPath::Named(name),
        )),
    }
}

const fn named(name: &'static str, modern_id: &'static str) -> FacadeKey {
    FacadeKey {
        name,
        legacy: Resolution::One(ModuleDescriptor::new(
            Selector::Match(Predicate::HasExport(name)),
            ExportPath::Named(name),
        )),
        modern: Resolution::One(ModuleDescriptor::new(
            Selector::Id(modern_id),
            ExportPath::Named(name),
        )),
    }
}

const fn module(name: &'static str, legacy: Resolution, modern_id: &'static str) -> FacadeKey {
    FacadeKey {
        name,
        legacy,
        modern: Resolution::One(ModuleDescriptor::id(modern_id)),
    }
}

const CHAT_STATE_LEGACY: &[ModuleDescriptor] = &[
    ModuleDescriptor::exporting("sendChatStateComposing"),
    ModuleDescriptor::exporting("markComposing"),
];

const USER_LEGACY: &[ModuleDescriptor] = &[
    ModuleDescriptor::exporting("getMaybeMeUser"),
    ModuleDescriptor::exporting("getMeUser"),
];

const GROUP_UTILS_LEGACY: &[ModuleDescriptor] = &[
    ModuleDescriptor::exporting("createGroup"),
    ModuleDescriptor::exporting("setGroupDescription"),
    ModuleDescriptor::exporting("sendExitGroup"),
    ModuleDescriptor::exporting("sendSetPicture"),
];

const GROUP_UTILS_MODERN: &[ModuleDescriptor] = &[
    ModuleDescriptor::id("WAWebGroupCreateJob"),
    ModuleDescriptor::id("WAWebGroupModifyInfoJob"),
    ModuleDescriptor::id("WAWebExitGroupAction"),
    ModuleDescriptor::id("WAWebContactProfilePicThumbBridge"),
];

/// Every canonical key, in resolution order.
pub const CATALOG: &[FacadeKey] = &[
    collection("Chat"),
    collection("Contact"),
    collection("Msg"),
    collection("Presence"),
    collection("GroupMetadata"),
    named("Conn", "WAWebConnModel"),
    named("Cmd", "WAWebCmd"),
    module(
        "WidFactory",
        Resolution::One(ModuleDescriptor::exporting("createWid")),
        "WAWebWidFactory",
    ),
    module(
        "SendMessage",
        Resolution::One(ModuleDescriptor::exporting("addAndSendMsgToChat")),
        "WAWebSendMsgChatAction",
    ),
    module(
        "PresenceUtils",
        Resolution::One(ModuleDescriptor::exporting("sendPresenceAvailable")),
        "WAWebPresenceChatAction",
    ),
    module(
        "ChatState",
        Resolution::FirstOf(CHAT_STATE_LEGACY),
        "WAWebChatStateBridge",
    ),
    module("User", Resolution::FirstOf(USER_LEGACY), "WAWebUserPrefsMeUser"),
    FacadeKey {
        name: "MsgKey",
        legacy: Resolution::One(ModuleDescriptor::new(
            Selector::Match(Predicate::DefaultHas("fromString")),
            ExportPath::Default,
        )),
        modern: Resolution::One(ModuleDescriptor::new(
            Selector::Id("WAWebMsgKey"),
            ExportPath::Default,
        )),
    },
    FacadeKey {
        name: "GroupUtils",
        legacy: Resolution::Union(GROUP_UTILS_LEGACY),
        modern: Resolution::Union(GROUP_UTILS_MODERN),
    },
    module(
        "MediaTypeInference",
        Resolution::One(ModuleDescriptor::exporting("mediaTypeFromProtobuf")),
        "WAWebBackendJobsCommon",
    ),
    module(
        "ProtoTypeInference",
        Resolution::One(ModuleDescriptor::exporting("typeAttributeFromProtobuf")),
        "WAWebE2EProtoUtils",
    ),
];

/// Look up a canonical key by name.
pub fn find(name: &str) -> Option<&'static FacadeKey> {
    CATALOG.iter().find(|k| k.name == name)
}
