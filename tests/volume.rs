use image::Rgba;
use matrix_bridge::matrix::Matrix;
use matrix_bridge::output::OutputChannel;
use matrix_bridge::volume::{
    parse_volume_payload, render_bar, rescale, VolumeError, VolumeOverlay,
};
use serial_test::serial;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WIDTH: u32 = 8;
const HEIGHT: u32 = 8;

fn test_overlay(timeout: Duration) -> (UdpSocket, VolumeOverlay) {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    server
        .set_read_timeout(Some(Duration::from_millis(500)))
        .unwrap();
    let port = server.local_addr().unwrap().port();
    let matrix =
        Arc::new(Matrix::connect("127.0.0.1", port, WIDTH, HEIGHT, 0, false).unwrap());
    let overlay = VolumeOverlay::new(OutputChannel::new(matrix, 0), timeout, 4);
    (server, overlay)
}

fn try_recv_frame(server: &UdpSocket) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; 65536];
    match server.recv_from(&mut buf) {
        Ok((n, _)) => {
            buf.truncate(n);
            Some(buf)
        }
        Err(e)
            if e.kind() == std::io::ErrorKind::WouldBlock
                || e.kind() == std::io::ErrorKind::TimedOut =>
        {
            None
        }
        Err(e) => panic!("unexpected recv error: {e}"),
    }
}

/// A blank (cleared) frame carries only the (1,1,1) color-keyed background.
fn is_blank(frame: &[u8]) -> bool {
    let header_len = format!("P6\n{WIDTH} {HEIGHT}\n255\n").len();
    let pixels = (WIDTH * HEIGHT * 3) as usize;
    frame[header_len..header_len + pixels].iter().all(|&b| b <= 1)
}

#[test]
fn rescale_maps_range_endpoints() {
    assert_eq!(rescale(0.0, 0.0, 100.0, 0.0, 64.0).unwrap(), 0.0);
    assert_eq!(rescale(100.0, 0.0, 100.0, 0.0, 64.0).unwrap(), 64.0);
    assert_eq!(rescale(-15.0, -30.0, 0.0, 0.0, 64.0).unwrap(), 32.0);
}

#[test]
fn rescale_rejects_empty_range() {
    assert!(matches!(
        rescale(5.0, 5.0, 5.0, 0.0, 64.0),
        Err(VolumeError::EmptyRange)
    ));
}

#[test]
fn payload_parsing() {
    let update = parse_volume_payload(b" 0, 50, 0, 100 ").unwrap();
    assert_eq!(update.current, 50.0);
    assert_eq!(update.min, 0.0);
    assert_eq!(update.max, 100.0);

    assert!(matches!(
        parse_volume_payload(b"1,2,3"),
        Err(VolumeError::FieldCount(3))
    ));
    assert!(matches!(
        parse_volume_payload(b"a,b,c,d"),
        Err(VolumeError::Parse(_))
    ));
    assert!(matches!(
        parse_volume_payload(&[0xff, 0xfe]),
        Err(VolumeError::NotText)
    ));
}

#[test]
fn bar_render_full_fractional_and_empty() {
    // Full bar: interior white, outline dim, area left of the bar untouched.
    let image = render_bar(HEIGHT as f64, WIDTH, HEIGHT, 4);
    assert_eq!(*image.get_pixel(5, 3), Rgba([255, 255, 255, 255]));
    assert_eq!(*image.get_pixel(4, 3), Rgba([40, 40, 40, 255]));
    assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 0]));

    // 2.5 pixels: two full rows, then a half-bright row above them.
    let image = render_bar(2.5, WIDTH, HEIGHT, 4);
    assert_eq!(*image.get_pixel(5, 7), Rgba([255, 255, 255, 255]));
    assert_eq!(*image.get_pixel(5, 6), Rgba([255, 255, 255, 255]));
    assert_eq!(image.get_pixel(5, 5).0[0], 127);

    // Zero level draws nothing.
    let image = render_bar(0.0, WIDTH, HEIGHT, 4);
    assert!(image.pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
}

#[test]
fn bad_update_leaves_display_untouched() {
    let (server, overlay) = test_overlay(Duration::from_secs(5));

    assert!(overlay.update(b"1,2,3").is_err());
    assert!(overlay.update(b"0,50,70,70").is_err()); // min == max
    server
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    assert!(try_recv_frame(&server).is_none());
}

#[test]
#[serial]
fn rapid_triggers_produce_exactly_one_revert() {
    let timeout = Duration::from_millis(400);
    let (server, overlay) = test_overlay(timeout);

    for _ in 0..3 {
        overlay.update(b"0,100,0,100").unwrap();
        std::thread::sleep(Duration::from_millis(100));
    }
    let last_trigger = Instant::now() - Duration::from_millis(100);

    // Three bar frames, then exactly one clear, and it must not arrive
    // before the last trigger's deadline.
    let mut shows = 0;
    let mut clears = 0;
    server
        .set_read_timeout(Some(Duration::from_millis(1500)))
        .unwrap();
    while let Some(frame) = try_recv_frame(&server) {
        if is_blank(&frame) {
            clears += 1;
            let elapsed = Instant::now().duration_since(last_trigger);
            assert!(
                elapsed >= timeout - Duration::from_millis(50),
                "revert fired after {elapsed:?}, before the last trigger's deadline"
            );
            break;
        } else {
            shows += 1;
        }
    }
    assert_eq!(shows, 3);
    assert_eq!(clears, 1);

    server
        .set_read_timeout(Some(Duration::from_millis(600)))
        .unwrap();
    assert!(try_recv_frame(&server).is_none(), "more than one revert fired");
}
