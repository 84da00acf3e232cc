use std::time::Duration;

use super::*;
use crate::headless::HeadlessHost;

fn instantiator() -> (HeadlessHost, TemplateInstantiator) {
    let host = HeadlessHost::new();
    let inst = TemplateInstantiator::new(Rc::new(host.clone()));
    (host, inst)
}

#[tokio::test]
async fn spawn_registers_and_release_one_unregisters() {
    let (host, inst) = instantiator();
    let scope = CancellationScope::never();
    let a = inst.spawn("Prefabs/A", None, &scope).await.unwrap();
    let b = inst.spawn("Prefabs/B", Some(a), &scope).await.unwrap();
    assert_eq!(inst.tracked_count(), 2);
    assert!(inst.is_tracked(b));

    assert!(inst.release_one(b));
    assert!(!inst.release_one(b));
    assert!(!inst.is_tracked(b));
    assert_eq!(host.released(), vec![b]);
}

#[tokio::test(start_paused = true)]
async fn cancellation_after_creation_releases_the_instance() {
    let (host, inst) = instantiator();
    host.set_spawn_latency(Duration::from_millis(100));
    let scope = CancellationScope::new();
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        scope.cancel();
    };
    let (res, ()) = futures::join!(inst.spawn("Prefabs/A", None, &scope), cancel);
    assert!(matches!(res, Err(VitrineError::Cancelled)));
    assert_eq!(inst.tracked_count(), 0);
    assert_eq!(host.spawned(), 1);
    assert!(host.live_objects().is_empty());
}

#[tokio::test]
async fn already_cancelled_scope_never_reaches_the_host() {
    let (host, inst) = instantiator();
    let scope = CancellationScope::new();
    scope.cancel();
    let res = inst.spawn("Prefabs/A", None, &scope).await;
    assert!(matches!(res, Err(VitrineError::Cancelled)));
    assert_eq!(host.spawned(), 0);
}

#[tokio::test]
async fn failed_creation_releases_partial_object() {
    let (host, inst) = instantiator();
    host.fail_template("Prefabs/Broken", true);
    host.fail_template("Prefabs/Missing", false);
    let scope = CancellationScope::never();

    let err = inst.spawn("Prefabs/Broken", None, &scope).await.unwrap_err();
    assert!(matches!(err, VitrineError::ResourceLoadFailed(_)));
    assert_eq!(host.released().len(), 1);
    assert!(host.live_objects().is_empty());

    let err = inst.spawn("Prefabs/Missing", None, &scope).await.unwrap_err();
    assert!(matches!(err, VitrineError::ResourceLoadFailed(_)));
    assert_eq!(inst.tracked_count(), 0);
}

#[tokio::test]
async fn release_all_goes_newest_first_and_closes() {
    let (host, inst) = instantiator();
    let scope = CancellationScope::never();
    let a = inst.spawn("Prefabs/A", None, &scope).await.unwrap();
    let b = inst.spawn("Prefabs/B", None, &scope).await.unwrap();
    let c = inst.spawn("Prefabs/C", None, &scope).await.unwrap();

    assert_eq!(inst.release_all(), 3);
    assert_eq!(host.released(), vec![c, b, a]);
    assert_eq!(inst.release_all(), 0);

    let err = inst.spawn("Prefabs/A", None, &scope).await.unwrap_err();
    assert!(matches!(err, VitrineError::ShutDown));
}

#[tokio::test(start_paused = true)]
async fn spawn_completing_after_close_is_released() {
    let (host, inst) = instantiator();
    host.set_spawn_latency(Duration::from_millis(100));
    let scope = CancellationScope::never();
    let close = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        inst.release_all();
    };
    let (res, ()) = futures::join!(inst.spawn("Prefabs/A", None, &scope), close);
    assert!(matches!(res, Err(VitrineError::ShutDown)));
    assert!(host.live_objects().is_empty());
}
