use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use storebridge_cdp::{CdpError, PageEvent};
use tokio::time::Instant;

use super::*;
use crate::registry::{Generation, ModuleRegistry};
use crate::testing::{FakeContext, FakePage, MAIN_FRAME, MemoryRegistry, page_script};

const MODERN: &str = "2.3000.1017";

struct Harness {
    page: Arc<FakePage>,
    modern: Arc<MemoryRegistry>,
    session: Arc<InjectionSession>,
}

fn options(budget_ms: u64) -> SessionOptions {
    SessionOptions {
        ready_expression: None,
        ready_timeout: Duration::from_millis(budget_ms),
        generation: GenerationSetting::Auto,
        poll_interval: Duration::from_millis(100),
    }
}

fn harness(page: FakePage, modern: MemoryRegistry, budget_ms: u64) -> Harness {
    let page = page.start();
    let modern = Arc::new(modern);
    let registries = Registries {
        legacy: Arc::new(MemoryRegistry::complete(Generation::Legacy)),
        modern: Arc::clone(&modern) as Arc<dyn ModuleRegistry>,
    };
    let session = Arc::new(
        InjectionSession::new(Arc::clone(&page) as Arc<dyn PageContext>, options(budget_ms))
            .with_registries(registries),
    );
    Harness {
        page,
        modern,
        session,
    }
}

#[tokio::test(start_paused = true)]
async fn test_navigation_during_wait_is_rearmed() {
    // Navigation at 300ms; the new context becomes ready 800ms later.
    let page = FakePage::with_timeline(vec![
        FakeContext::at(0, None),
        FakeContext::at(300, Some(800)),
    ])
    .on_evaluate(page_script(MODERN));
    let h = harness(page, MemoryRegistry::complete(Generation::Modern), 15_000);

    let started = Instant::now();
    let facade = h.session.start().await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(1100));
    assert!(elapsed < Duration::from_millis(15_000));
    assert_eq!(h.session.state(), InjectionState::Ready);
    assert_eq!(h.session.rearms(), 1);
    assert_eq!(facade.generation(), Generation::Modern);
    assert_eq!(facade.version(), Some(MODERN));
}

struct Interleaving {
    name: &'static str,
    timeline: Vec<FakeContext>,
    budget_ms: u64,
    /// Earliest bind completion, or `None` when the bind must time out.
    ready_at_ms: Option<u64>,
    rearms: u32,
}

#[tokio::test(start_paused = true)]
async fn test_navigation_interleavings() {
    let cases = vec![
        Interleaving {
            name: "two navigations in one wait",
            timeline: vec![
                FakeContext::at(0, None),
                FakeContext::at(300, None),
                FakeContext::at(700, Some(500)),
            ],
            budget_ms: 15_000,
            ready_at_ms: Some(1_200),
            rearms: 2,
        },
        Interleaving {
            name: "replaced just before its readiness",
            timeline: vec![FakeContext::at(0, Some(500)), FakeContext::at(400, None)],
            budget_ms: 2_000,
            ready_at_ms: None,
            rearms: 1,
        },
        Interleaving {
            name: "replaced before readiness, successor ready",
            timeline: vec![
                FakeContext::at(0, Some(500)),
                FakeContext::at(400, Some(1_000)),
            ],
            budget_ms: 15_000,
            ready_at_ms: Some(1_400),
            rearms: 1,
        },
        Interleaving {
            name: "ready before any navigation",
            timeline: vec![FakeContext::at(0, Some(100)), FakeContext::at(300, Some(100))],
            budget_ms: 15_000,
            ready_at_ms: Some(100),
            rearms: 0,
        },
        Interleaving {
            name: "navigation after the budget",
            timeline: vec![FakeContext::at(0, None), FakeContext::at(3_000, Some(0))],
            budget_ms: 2_000,
            ready_at_ms: None,
            rearms: 0,
        },
    ];

    for case in cases {
        let page = FakePage::with_timeline(case.timeline).on_evaluate(page_script(MODERN));
        let h = harness(page, MemoryRegistry::complete(Generation::Modern), case.budget_ms);

        let started = Instant::now();
        let result = h.session.start().await;
        let elapsed = started.elapsed();

        match case.ready_at_ms {
            Some(ready_at) => {
                let facade = result.unwrap_or_else(|e| panic!("{}: {}", case.name, e));
                assert!(elapsed >= Duration::from_millis(ready_at), "{}", case.name);
                assert!(elapsed < Duration::from_millis(case.budget_ms), "{}", case.name);
                assert_eq!(facade.epoch(), h.session.epoch(), "{}", case.name);
                assert_eq!(h.session.rearms(), case.rearms, "{}", case.name);
            }
            None => {
                let err = result.err().unwrap_or_else(|| panic!("{}: bound", case.name));
                assert!(
                    matches!(err, BridgeError::InjectionTimeout { rearms, .. } if rearms == case.rearms),
                    "{}: {}",
                    case.name,
                    err
                );
                assert_eq!(elapsed, Duration::from_millis(case.budget_ms), "{}", case.name);
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_wait_fails_under_same_navigation() {
    let page = FakePage::with_timeline(vec![
        FakeContext::at(0, None),
        FakeContext::at(300, Some(800)),
    ])
    .start();

    let result = page
        .wait_for_function("ready()", Duration::from_millis(15_000))
        .await;
    assert!(matches!(result, Err(CdpError::ContextDestroyed(_))));
}

#[tokio::test(start_paused = true)]
async fn test_budget_is_cumulative_across_rearms() {
    let page = FakePage::with_timeline(vec![
        FakeContext::at(0, None),
        FakeContext::at(5_000, None),
    ])
    .on_evaluate(page_script(MODERN));
    let h = harness(page, MemoryRegistry::complete(Generation::Modern), 8_000);

    let started = Instant::now();
    let err = h.session.bind().await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(
        err,
        BridgeError::InjectionTimeout {
            budget_ms: 8_000,
            rearms: 1
        }
    ));
    assert!(elapsed >= Duration::from_millis(8_000));
    assert!(elapsed < Duration::from_millis(8_200));
    assert_eq!(h.session.state(), InjectionState::Failed);
    assert!(h.session.facade().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_ready_after_budget_times_out() {
    let page = FakePage::with_timeline(vec![FakeContext::at(0, Some(2_000))])
        .on_evaluate(page_script(MODERN));
    let h = harness(page, MemoryRegistry::complete(Generation::Modern), 1_000);

    let err = h.session.bind().await.unwrap_err();
    assert!(matches!(err, BridgeError::InjectionTimeout { rearms: 0, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_binds_build_once() {
    let page = FakePage::ready().on_evaluate(page_script(MODERN));
    let h = harness(page, MemoryRegistry::complete(Generation::Modern), 5_000);

    let (a, b) = tokio::join!(h.session.bind(), h.session.bind());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(h.modern.prepares.load(Ordering::SeqCst), 1);
    assert_eq!(h.page.evaluated("__storebridgePatched"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_queued_bind_shares_failed_attempt() {
    let page = FakePage::with_timeline(vec![FakeContext::at(0, None)]).on_evaluate(page_script(MODERN));
    let h = harness(page, MemoryRegistry::complete(Generation::Modern), 1_000);

    let started = Instant::now();
    let (a, b) = tokio::join!(h.session.bind(), h.session.bind());

    assert!(matches!(a, Err(BridgeError::InjectionTimeout { budget_ms: 1_000, .. })));
    assert!(matches!(b, Err(BridgeError::InjectionTimeout { budget_ms: 1_000, .. })));
    assert_eq!(started.elapsed(), Duration::from_millis(1_000));
    assert_eq!(h.page.waits.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_bind_behind_listener_bind_fails_within_one_budget() {
    // Startup order: listen, navigate (new context at 200ms), then bind.
    let page = FakePage::with_timeline(vec![FakeContext::at(0, None), FakeContext::at(200, None)])
        .on_evaluate(page_script(MODERN));
    let h = harness(page, MemoryRegistry::complete(Generation::Modern), 1_000);

    let started = Instant::now();
    h.session.listen();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.session.epoch(), 1);

    let err = h.session.bind().await.unwrap_err();
    assert!(matches!(err, BridgeError::InjectionTimeout { .. }));
    assert_eq!(started.elapsed(), Duration::from_millis(1_200));
    assert_eq!(h.page.waits.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_later_bind_after_failure_tries_again() {
    let page = FakePage::with_timeline(vec![FakeContext::at(0, None)]).on_evaluate(page_script(MODERN));
    let h = harness(page, MemoryRegistry::complete(Generation::Modern), 1_000);

    assert!(h.session.bind().await.is_err());
    assert!(h.session.bind().await.is_err());
    assert_eq!(h.page.waits.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_child_frame_context_does_not_rebind() {
    let page = FakePage::ready().on_evaluate(page_script(MODERN));
    let h = harness(page, MemoryRegistry::complete(Generation::Modern), 5_000);

    let first = h.session.start().await.unwrap();
    h.page.emit(PageEvent::ContextCreated {
        context_id: 40,
        frame_id: Some("child-iframe".to_string()),
        is_default: true,
    });
    tokio::time::sleep(Duration::from_millis(1_000)).await;

    assert_eq!(h.session.epoch(), 0);
    assert!(Arc::ptr_eq(&first, &h.session.facade().unwrap()));
    assert_eq!(h.modern.prepares.load(Ordering::SeqCst), 1);

    h.page.emit(PageEvent::ContextCreated {
        context_id: 41,
        frame_id: Some(MAIN_FRAME.to_string()),
        is_default: true,
    });
    tokio::time::sleep(Duration::from_millis(1_000)).await;

    assert_eq!(h.session.epoch(), 1);
    assert_ne!(first.instance(), h.session.facade().unwrap().instance());
    assert_eq!(h.modern.prepares.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_recreated_context_rebinds_and_repatches() {
    let page = FakePage::with_timeline(vec![
        FakeContext::at(0, Some(0)),
        FakeContext::at(2_000, Some(500)),
    ])
    .on_evaluate(page_script(MODERN));
    let h = harness(page, MemoryRegistry::complete(Generation::Modern), 5_000);

    let first = h.session.start().await.unwrap();
    assert_eq!(first.epoch(), 0);

    tokio::time::sleep(Duration::from_millis(3_000)).await;

    let second = h.session.facade().unwrap();
    assert_ne!(first.instance(), second.instance());
    assert_eq!(second.epoch(), 1);
    assert_eq!(h.session.epoch(), 1);
    assert_eq!(h.session.state(), InjectionState::Ready);
    assert_eq!(h.modern.prepares.load(Ordering::SeqCst), 2);
    assert_eq!(h.page.evaluated("__storebridgePatched"), 4);
}

#[tokio::test(start_paused = true)]
async fn test_bind_is_reused_within_one_context() {
    let page = FakePage::ready().on_evaluate(page_script(MODERN));
    let h = harness(page, MemoryRegistry::complete(Generation::Modern), 5_000);

    let first = h.session.start().await.unwrap();
    let again = h.session.bind().await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(h.page.waits.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unresolved_key_fails_without_facade() {
    let page = FakePage::ready().on_evaluate(page_script(MODERN));
    let registry = MemoryRegistry::complete(Generation::Modern).without("WAWebExitGroupAction");
    let h = harness(page, registry, 5_000);

    let err = h.session.bind().await.unwrap_err();
    assert!(matches!(err, BridgeError::ModuleResolution { ref key } if key == "GroupUtils"));
    assert_eq!(h.session.state(), InjectionState::Failed);
    assert!(h.session.facade().is_none());
    assert_eq!(h.page.evaluated("window.Store = S"), 0);
    assert_eq!(h.page.evaluated("__storebridgePatched"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_context_lost_during_build_rearms() {
    let lost_once = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&lost_once);
    let script = page_script(MODERN);
    let page = FakePage::ready().on_evaluate(move |expression| {
        if expression.contains("window.Store = S") && !flag.swap(true, Ordering::SeqCst) {
            return Err(CdpError::ContextDestroyed(
                "Execution context was destroyed.".to_string(),
            ));
        }
        script(expression)
    });
    let h = harness(page, MemoryRegistry::complete(Generation::Modern), 5_000);

    let facade = h.session.bind().await.unwrap();
    assert!(lost_once.load(Ordering::SeqCst));
    assert_eq!(h.page.waits.load(Ordering::SeqCst), 2);
    assert_eq!(h.session.rearms(), 1);
    assert_eq!(facade.keys().len(), crate::store::CATALOG.len());
}

#[tokio::test(start_paused = true)]
async fn test_forced_legacy_generation() {
    let page = FakePage::ready().on_evaluate(page_script(MODERN)).start();
    let legacy = Arc::new(MemoryRegistry::complete(Generation::Legacy));
    let registries = Registries {
        legacy: Arc::clone(&legacy) as Arc<dyn ModuleRegistry>,
        modern: Arc::new(MemoryRegistry::complete(Generation::Modern)),
    };
    let mut opts = options(5_000);
    opts.generation = GenerationSetting::Legacy;
    let session = InjectionSession::new(page as Arc<dyn PageContext>, opts).with_registries(registries);

    let facade = session.bind().await.unwrap();
    assert_eq!(facade.generation(), Generation::Legacy);
    assert_eq!(legacy.prepares.load(Ordering::SeqCst), 1);
}

#[test]
fn test_options_from_config() {
    let config = SessionConfig {
        ready_timeout_ms: 1500,
        generation: GenerationSetting::Modern,
        ready_expression: Some("window.ok".to_string()),
        poll_interval_ms: 50,
    };
    let options = SessionOptions::from(&config);
    assert_eq!(options.ready_timeout, Duration::from_millis(1500));
    assert_eq!(options.poll_interval, Duration::from_millis(50));
    assert_eq!(options.ready_expression.as_deref(), Some("window.ok"));
}

#[test]
fn test_terminal_states() {
    assert!(InjectionState::Ready.is_terminal());
    assert!(InjectionState::Failed.is_terminal());
    assert!(!InjectionState::Polling.is_terminal());
    let _: Value = serde_json::to_value(InjectionState::NotReady).unwrap();
}
