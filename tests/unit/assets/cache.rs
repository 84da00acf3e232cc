use std::{cell::Cell, time::Duration};

use super::*;
use crate::assets::source::{AssetKind, MaterialAsset, TextureAsset};

#[derive(Default)]
struct SlowSource {
    loads: Cell<u32>,
    releases: Cell<u32>,
    fail: Cell<bool>,
}

impl AssetSource for Rc<SlowSource> {
    fn load(&self, key: &AssetKey) -> LocalBoxFuture<'static, anyhow::Result<AssetHandle>> {
        self.loads.set(self.loads.get() + 1);
        let fail = self.fail.get();
        let path = key.path.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if fail {
                anyhow::bail!("no such material");
            }
            Ok(AssetHandle::new(
                path.clone(),
                MaterialAsset {
                    name: path,
                    bytes: Rc::new(vec![1, 2, 3]),
                },
            ))
        }
        .boxed_local()
    }

    fn release(&self, _handle: &AssetHandle) {
        self.releases.set(self.releases.get() + 1);
    }
}

fn cache() -> (Rc<SlowSource>, ResourceCache) {
    let source = Rc::new(SlowSource::default());
    let cache = ResourceCache::new(Rc::new(source.clone()));
    (source, cache)
}

#[tokio::test(start_paused = true)]
async fn sequential_loads_return_the_same_asset() {
    let (source, cache) = cache();
    let scope = CancellationScope::never();
    let a = cache.load::<MaterialAsset>("Mat/A", &scope).await.unwrap();
    let b = cache.load::<MaterialAsset>("Mat/A", &scope).await.unwrap();
    assert!(Rc::ptr_eq(&a, &b));
    assert_eq!(source.loads.get(), 1);
    assert!(cache.contains(&AssetKey::new(AssetKind::Material, "Mat/A")));
}

#[tokio::test(start_paused = true)]
async fn concurrent_loads_share_one_request() {
    let (source, cache) = cache();
    let scope = CancellationScope::never();
    let (a, b, c) = futures::join!(
        cache.load::<MaterialAsset>("Mat/A", &scope),
        cache.load::<MaterialAsset>("Mat/A", &scope),
        cache.load::<MaterialAsset>("Mat/A", &scope),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
    assert!(Rc::ptr_eq(&a, &b) && Rc::ptr_eq(&b, &c));
    assert_eq!(cache.loads_issued(), 1);
    assert_eq!(source.loads.get(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_caller_still_leaves_the_asset_cached() {
    let (source, cache) = cache();
    let scope = CancellationScope::new();
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        scope.cancel();
    };
    let (res, ()) = futures::join!(cache.load::<MaterialAsset>("Mat/A", &scope), cancel);
    assert!(matches!(res, Err(VitrineError::Cancelled)));
    assert_eq!(cache.len(), 1);

    let again = cache
        .load::<MaterialAsset>("Mat/A", &CancellationScope::never())
        .await;
    assert!(again.is_ok());
    assert_eq!(source.loads.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropped_caller_does_not_orphan_the_load() {
    let (_source, cache) = cache();
    let scope = CancellationScope::never();
    {
        let load = cache.load::<MaterialAsset>("Mat/A", &scope);
        futures::pin_mut!(load);
        assert!(futures::poll!(load.as_mut()).is_pending());
    }
    // The in-flight load stays parked in its slot; the next caller joins it.
    let handle = cache.load::<MaterialAsset>("Mat/A", &scope).await;
    assert!(handle.is_ok());
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.loads_issued(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_load_is_not_cached() {
    let (source, cache) = cache();
    source.fail.set(true);
    let scope = CancellationScope::never();
    let err = cache.load::<MaterialAsset>("Mat/A", &scope).await.unwrap_err();
    assert!(matches!(err, VitrineError::ResourceLoadFailed(_)));
    assert!(cache.is_empty());

    source.fail.set(false);
    assert!(cache.load::<MaterialAsset>("Mat/A", &scope).await.is_ok());
    assert_eq!(source.loads.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn wrong_kind_and_empty_key_fail() {
    let (_source, cache) = cache();
    let scope = CancellationScope::never();
    let err = cache.load::<TextureAsset>("", &scope).await.unwrap_err();
    assert!(matches!(err, VitrineError::ResourceLoadFailed(_)));

    let handle = cache
        .load_handle(AssetKey::new(AssetKind::Texture, "Mat/A"), &scope)
        .await
        .unwrap();
    assert!(handle.downcast::<TextureAsset>().is_none());
}

#[tokio::test(start_paused = true)]
async fn release_all_runs_once_and_closes_the_cache() {
    let (source, cache) = cache();
    let scope = CancellationScope::never();
    cache.load::<MaterialAsset>("Mat/A", &scope).await.unwrap();
    cache.load::<MaterialAsset>("Mat/B", &scope).await.unwrap();

    assert_eq!(cache.release_all(), 2);
    assert_eq!(cache.release_all(), 0);
    assert_eq!(source.releases.get(), 2);
    assert!(cache.is_closed());
    assert!(cache.is_empty());

    let err = cache.load::<MaterialAsset>("Mat/A", &scope).await.unwrap_err();
    assert!(matches!(err, VitrineError::ShutDown));
}

#[tokio::test(start_paused = true)]
async fn load_finishing_after_release_all_is_released() {
    let (source, cache) = cache();
    let scope = CancellationScope::never();
    let close = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.release_all();
    };
    let (res, ()) = futures::join!(cache.load::<MaterialAsset>("Mat/A", &scope), close);
    assert!(matches!(res, Err(VitrineError::ShutDown)));
    assert_eq!(source.releases.get(), 1);
    assert!(cache.is_empty());
}
