use super::*;
use crate::headless::HeadlessHost;

fn binder(host: &HeadlessHost, root: &Path, runtime: RuntimeProfile) -> VideoResourceBinder {
    VideoResourceBinder::new(
        Rc::new(host.clone()),
        root,
        runtime,
        VideoSettings::default(),
    )
}

const UNRELIABLE: RuntimeProfile = RuntimeProfile {
    primary_video_reliable: false,
    can_check_files: true,
};

#[test]
fn prepare_wait_orders_outcomes() {
    let mut wait = PrepareWait::new(Duration::from_millis(100));
    assert_eq!(
        wait.step(false, false, Duration::from_millis(60)),
        PrepareState::Waiting
    );
    assert_eq!(
        wait.step(true, true, Duration::from_secs(10)),
        PrepareState::Prepared
    );
    assert_eq!(
        wait.step(false, true, Duration::from_secs(10)),
        PrepareState::Cancelled
    );
    assert_eq!(
        wait.step(false, false, Duration::from_millis(40)),
        PrepareState::Waiting
    );
    assert_eq!(
        wait.step(false, false, Duration::from_millis(1)),
        PrepareState::TimedOut
    );
    assert_eq!(wait.elapsed(), Duration::from_millis(101));
}

#[test]
fn fallback_url_needs_unreliable_runtime_and_existing_file() {
    let host = HeadlessHost::new();
    let root = Path::new("/content");
    host.add_file("/content/Video/clip.mp4");

    let url = binder(&host, root, UNRELIABLE)
        .resolve_playable_url("Video/clip.WEBM")
        .unwrap();
    assert!(url.as_str().ends_with("/content/Video/clip.mp4"), "{url}");

    let reliable = RuntimeProfile {
        primary_video_reliable: true,
        can_check_files: true,
    };
    let url = binder(&host, root, reliable)
        .resolve_playable_url("Video/clip.webm")
        .unwrap();
    assert!(url.as_str().ends_with("/content/Video/clip.webm"), "{url}");

    let blind = RuntimeProfile {
        primary_video_reliable: false,
        can_check_files: false,
    };
    let url = binder(&host, root, blind)
        .resolve_playable_url("Video/clip.webm")
        .unwrap();
    assert!(url.as_str().ends_with(".webm"), "{url}");

    let url = binder(&host, root, UNRELIABLE)
        .resolve_playable_url("Video/other.webm")
        .unwrap();
    assert!(url.as_str().ends_with("/content/Video/other.webm"), "{url}");
    assert_eq!(url.scheme(), "file");
}

#[test]
fn bad_video_paths_are_config_errors() {
    let host = HeadlessHost::new();
    let b = binder(&host, Path::new("/content"), UNRELIABLE);
    assert!(matches!(
        b.resolve_playable_url("../escape.webm"),
        Err(VitrineError::ConfigInvalid(_))
    ));
    assert!(matches!(
        b.resolve_playable_url(""),
        Err(VitrineError::ConfigInvalid(_))
    ));
}

#[test]
fn wire_output_clamps_and_binds() {
    let host = HeadlessHost::new();
    let b = binder(&host, Path::new("/content"), UNRELIABLE);
    let player = HostObject(100);
    let surface = b.wire_output(player, player, Vec2::new(0.4, 320.0));
    assert_eq!(host.surface_size(surface), Some((2, 320)));
    let state = host.player(player).unwrap();
    assert_eq!(state.output, Some(surface));
    assert_eq!(state.display, Some(surface));

    b.release_surface(player, player, surface);
    assert!(host.live_surfaces().is_empty());
    assert_eq!(host.released_surfaces(), vec![surface]);
    assert_eq!(host.player(player).unwrap().output, None);
}

#[tokio::test(start_paused = true)]
async fn prepare_and_play_starts_audio_only_with_volume() {
    let host = HeadlessHost::new();
    host.set_prepare_delay(Some(Duration::from_millis(100)));
    let b = binder(&host, Path::new("/content"), UNRELIABLE);
    let url = b.resolve_playable_url("Video/a.mp4").unwrap();
    let scope = CancellationScope::never();

    let ok = b
        .prepare_and_play(HostObject(1), &url, HostObject(1), 2.0, &scope, Duration::from_secs(1))
        .await;
    assert!(ok);
    let state = host.player(HostObject(1)).unwrap();
    assert!(state.playing);
    assert!(state.audio_started);
    let config = state.config.unwrap();
    assert!(config.looping);
    assert_eq!(config.volume, 1.0);
    assert_eq!(host.subscription_count(), 0);

    let ok = b
        .prepare_and_play(HostObject(2), &url, HostObject(2), 0.0, &scope, Duration::from_secs(1))
        .await;
    assert!(ok);
    assert!(!host.player(HostObject(2)).unwrap().audio_started);
}

#[tokio::test(start_paused = true)]
async fn prepare_and_play_times_out_without_throwing() {
    let host = HeadlessHost::new();
    host.set_prepare_delay(None);
    let b = binder(&host, Path::new("/content"), UNRELIABLE);
    let url = b.resolve_playable_url("Video/a.mp4").unwrap();

    let started = Instant::now();
    let ok = b
        .prepare_and_play(
            HostObject(1),
            &url,
            HostObject(1),
            1.0,
            &CancellationScope::never(),
            Duration::from_millis(500),
        )
        .await;
    assert!(!ok);
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(!host.player(HostObject(1)).unwrap().playing);
    assert_eq!(host.subscription_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn prepare_and_play_observes_cancellation() {
    let host = HeadlessHost::new();
    host.set_prepare_delay(None);
    let b = binder(&host, Path::new("/content"), UNRELIABLE);
    let url = b.resolve_playable_url("Video/a.mp4").unwrap();
    let scope = CancellationScope::new();

    let cancel = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        host.emit_player_error(HostObject(1), "decoder hiccup");
        scope.cancel();
    };
    let started = Instant::now();
    let (ok, ()) = futures::join!(
        b.prepare_and_play(HostObject(1), &url, HostObject(1), 1.0, &scope, Duration::from_secs(10)),
        cancel
    );
    assert!(!ok);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(host.subscription_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn restart_requires_a_source() {
    let host = HeadlessHost::new();
    let b = binder(&host, Path::new("/content"), UNRELIABLE);
    let scope = CancellationScope::never();
    assert!(
        !b.restart_from_start(HostObject(1), &scope, Duration::from_secs(1))
            .await
    );

    let url = b.resolve_playable_url("Video/a.mp4").unwrap();
    assert!(
        b.prepare_and_play(HostObject(1), &url, HostObject(1), 0.0, &scope, Duration::from_secs(1))
            .await
    );
    assert!(
        b.restart_from_start(HostObject(1), &scope, Duration::from_secs(1))
            .await
    );
    let state = host.player(HostObject(1)).unwrap();
    assert_eq!(state.stops, 1);
    assert_eq!(state.rewinds, 1);
    assert!(state.playing);
}

#[test]
fn subscriptions_are_keyed_by_ordered_ids() {
    let host = HeadlessHost::new();
    let backend: &dyn VideoBackend = &host;
    let first = backend.subscribe_errors(HostObject(1), Box::new(|_| {}));
    let second = backend.subscribe_errors(HostObject(2), Box::new(|_| {}));
    assert!(first < second);
    assert_eq!(host.subscription_count(), 2);

    backend.unsubscribe(HostObject(1), first);
    assert_eq!(host.subscription_count(), 1);
    backend.unsubscribe(HostObject(2), second);
    assert_eq!(host.subscription_count(), 0);
}
