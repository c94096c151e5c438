use std::time::Duration;

use camtext_capture::{
    AuthorizationStatus, Backend, CaptureError, CaptureSession, Configuration, Resolution,
    ResolutionPreference, SessionPreset,
};
use futures_util::StreamExt;

fn mock_config() -> Configuration {
    Configuration {
        backend: Backend::Mock,
        frame_interval: Duration::from_millis(2),
        ..Configuration::default()
    }
}

fn start(config: &Configuration) -> Result<CaptureSession, CaptureError> {
    CaptureSession::start(config, config.authorizer().as_ref())
}

#[tokio::test(flavor = "multi_thread")]
async fn delivers_frames_at_negotiated_resolution() {
    let config = Configuration {
        frame_limit: Some(5),
        ..mock_config()
    };
    let mut session = start(&config).expect("session starts");
    let mut frames = session.take_frames().expect("frames available");
    assert!(session.take_frames().is_none());

    let frame = frames.next().await.expect("at least one frame");
    assert_eq!(frame.resolution(), session.format().resolution);
    assert!(frame.frame_index().is_some());
    session.join().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn falls_back_when_primary_tier_is_missing() {
    let mut session = start(&mock_config()).unwrap();
    let format = *session.format();
    assert!(format.fell_back);
    assert_eq!(format.preset, SessionPreset::Hd1080);
    assert_eq!(format.resolution, Resolution::new(1920, 1080));

    let mut frames = session.take_frames().unwrap();
    let frame = frames.next().await.unwrap();
    assert_eq!(frame.width(), 1920);
    session.join().unwrap();
}

#[test]
fn primary_tier_is_used_when_available() {
    let config = Configuration {
        mock_resolutions: Some(vec![
            Resolution::new(3840, 2160),
            Resolution::new(1920, 1080),
        ]),
        ..mock_config()
    };
    let session = start(&config).unwrap();
    assert!(!session.format().fell_back);
    assert_eq!(session.format().preset, SessionPreset::Hd4k);
    session.join().unwrap();
}

#[test]
fn denied_authorization_never_starts_capture() {
    for status in [AuthorizationStatus::Denied, AuthorizationStatus::Restricted] {
        let config = Configuration {
            mock_authorization: status,
            ..mock_config()
        };
        match start(&config) {
            Err(CaptureError::AuthorizationDenied { status: reported }) => {
                assert_eq!(reported, status)
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("session started despite {status}"),
        }
    }
}

#[test]
fn device_without_modes_fails_configuration() {
    let config = Configuration {
        mock_resolutions: Some(Vec::new()),
        ..mock_config()
    };
    assert!(matches!(
        start(&config),
        Err(CaptureError::SessionConfiguration { .. })
    ));
}

#[test]
fn no_matching_tier_names_what_the_device_offers() {
    let config = Configuration {
        mock_resolutions: Some(vec![Resolution::new(640, 480)]),
        resolution: ResolutionPreference {
            primary: SessionPreset::Hd4k,
            fallback: Some(SessionPreset::Hd1080),
        },
        ..mock_config()
    };
    let err = start(&config).err().expect("negotiation fails");
    assert!(matches!(err, CaptureError::SessionConfiguration { .. }));
    assert!(err.to_string().contains("640x480"));
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_ends_delivery() {
    let mut session = start(&mock_config()).unwrap();
    let controller = session.controller();
    let mut frames = session.take_frames().unwrap();

    assert!(frames.next().await.is_some());
    controller.stop();
    assert!(controller.is_stopped());
    assert!(frames.next().await.is_none());
    assert!(frames.try_take().is_none());
    session.join().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_consumer_only_sees_the_latest_frame() {
    let config = Configuration {
        frame_limit: Some(20),
        frame_interval: Duration::from_millis(1),
        ..mock_config()
    };
    let mut session = start(&config).unwrap();
    let mut frames = session.take_frames().unwrap();
    let controller = session.controller();
    tokio::task::spawn_blocking(move || session.wait())
        .await
        .unwrap()
        .unwrap();

    let latest = frames.next().await.expect("last frame still pending");
    assert_eq!(latest.frame_index(), Some(19));
    assert!(frames.next().await.is_none());

    let stats = controller.slot_stats();
    assert_eq!(stats.published, 20);
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.discarded, 19);
}

#[tokio::test(flavor = "multi_thread")]
async fn frames_can_be_consumed_as_a_stream() {
    let config = Configuration {
        frame_limit: Some(3),
        ..mock_config()
    };
    let mut session = start(&config).unwrap();
    let stream = session.take_frames().unwrap().into_stream();
    let received: Vec<_> = stream.take(1).collect().await;
    assert_eq!(received.len(), 1);
    session.join().unwrap();
}
