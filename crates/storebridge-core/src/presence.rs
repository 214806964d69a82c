//! Presence subscription and lookup through capability probes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BridgeError;
use crate::page::PageContext;
use crate::probe::CapabilityProbe;
use crate::registry::js_str;
use crate::store::{FACADE_ROOT, StoreFacade};

/// Online state of one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub is_online: bool,
    pub last_seen: Option<i64>,
}

impl PresenceRecord {
    /// Accept only `{ isOnline: bool, lastSeen: number | null }`; a missing
    /// `lastSeen` reads as `null`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let is_online = object.get("isOnline")?.as_bool()?;
        let last_seen = match object.get("lastSeen") {
            None | Some(Value::Null) => None,
            Some(seen) => Some(seen.as_f64()? as i64),
        };
        Some(Self {
            is_online,
            last_seen,
        })
    }
}

/// `(name, facade key, member, body)`; `body` runs with `S` and `wid` in scope.
type Step = (&'static str, &'static str, &'static str, &'static str);

const SUBSCRIBE_STEPS: &[Step] = &[
    (
        "bulk-subscribe",
        "PresenceUtils",
        "subscribePresences",
        "await S.PresenceUtils.subscribePresences([wid]); return true;",
    ),
    (
        "send-subscribe",
        "PresenceUtils",
        "sendSubscribe",
        "await S.PresenceUtils.sendSubscribe(wid); return true;",
    ),
    (
        "device-subscribe",
        "PresenceUtils",
        "subscribeDevicePresence",
        "await S.PresenceUtils.subscribeDevicePresence(wid); return true;",
    ),
    (
        "single-subscribe",
        "PresenceUtils",
        "subscribePresence",
        "await S.PresenceUtils.subscribePresence(wid); return true;",
    ),
    (
        "collection-insert",
        "Presence",
        "add",
        "S.Presence.add({ id: wid }); return true;",
    ),
    (
        "open-chat",
        "Cmd",
        "openChatAt",
        "const chat = await (S.Chat.find || S.Chat._find).call(S.Chat, wid); await S.Cmd.openChatAt(chat); return true;",
    ),
];

const READ_STEPS: &[Step] = &[
    (
        "contact-embedded",
        "Contact",
        "get",
        "const c = S.Contact.get(wid); return c ? { isOnline: c.isOnline, lastSeen: c.lastSeen } : null;",
    ),
    (
        "multi-device",
        "Presence",
        "get",
        "const p = S.Presence.get(wid); if (!p || !p.chatstates) { return null; } \
         const states = typeof p.chatstates.getModelsArray === 'function' ? p.chatstates.getModelsArray() : []; \
         const seen = states.map((s) => s.t).filter((t) => typeof t === 'number'); \
         return { isOnline: p.isOnline === true || states.some((s) => s.type === 'available'), lastSeen: seen.length ? Math.max(...seen) : null };",
    ),
    (
        "single-device",
        "Presence",
        "find",
        "const p = await S.Presence.find(wid); if (!p) { return null; } \
         const cs = p.chatstate || {}; \
         return { isOnline: p.isOnline, lastSeen: typeof cs.t === 'number' ? cs.t : null };",
    ),
];

fn step_script(wid: &str, body: &str) -> String {
    format!(
        "(async () => {{ const S = {}; const wid = S.WidFactory.createWid({}); {} }})()",
        FACADE_ROOT,
        js_str(wid),
        body
    )
}

async fn run_subscribe(page: &dyn PageContext, script: String) -> Result<Option<()>, BridgeError> {
    let value = page.evaluate(&script).await?;
    Ok((value == Value::Bool(true)).then_some(()))
}

async fn run_read(
    page: &dyn PageContext,
    script: String,
) -> Result<Option<PresenceRecord>, BridgeError> {
    let value = page.evaluate(&script).await?;
    Ok(PresenceRecord::from_value(&value))
}

/// Subscribe to presence updates for `wid`. `false` when no route works.
pub async fn subscribe_presence(page: &dyn PageContext, facade: &StoreFacade, wid: &str) -> bool {
    let mut probe = CapabilityProbe::new("presence-subscribe");
    for &(name, key, member, body) in SUBSCRIBE_STEPS {
        probe = probe.strategy(
            name,
            move || facade.is_callable(page, key, member),
            move || run_subscribe(page, step_script(wid, body)),
        );
    }
    probe.run().await.is_some()
}

/// Read the current presence of `wid`; `None` when nothing yields a valid record.
pub async fn read_presence(
    page: &dyn PageContext,
    facade: &StoreFacade,
    wid: &str,
) -> Option<PresenceRecord> {
    let mut probe = CapabilityProbe::new("presence-read");
    for &(name, key, member, body) in READ_STEPS {
        probe = probe.strategy(
            name,
            move || facade.is_callable(page, key, member),
            move || run_read(page, step_script(wid, body)),
        );
    }
    probe.run().await
}

#[cfg(test)]
#[path = "presence_tests.rs"]
mod tests;
