use chrono::{Local, NaiveTime};
use matrix_bridge::clock::{render_analog, render_digital, Clock, ClockKind, TimeWindow};
use matrix_bridge::matrix::Matrix;
use matrix_bridge::output::OutputChannel;
use serial_test::serial;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

const WIDTH: u32 = 16;
const HEIGHT: u32 = 16;

fn test_channel() -> (UdpSocket, OutputChannel) {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    server
        .set_read_timeout(Some(Duration::from_millis(2000)))
        .unwrap();
    let port = server.local_addr().unwrap().port();
    let matrix =
        Arc::new(Matrix::connect("127.0.0.1", port, WIDTH, HEIGHT, 0, false).unwrap());
    (server, OutputChannel::new(matrix, 1))
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

fn is_blank(frame: &[u8]) -> bool {
    let header_len = format!("P6\n{WIDTH} {HEIGHT}\n255\n").len();
    let pixels = (WIDTH * HEIGHT * 3) as usize;
    frame[header_len..header_len + pixels].iter().all(|&b| b <= 1)
}

/// A window reaching from one hour ago to one hour ahead, so "now" is
/// always inside it (wrapping midnight if need be).
fn window_around_now() -> TimeWindow {
    let now = Local::now().time();
    let start = now.overflowing_sub_signed(chrono::Duration::hours(1)).0;
    let end = now.overflowing_add_signed(chrono::Duration::hours(1)).0;
    TimeWindow::parse(&start.format("%H:%M").to_string(), &end.format("%H:%M").to_string())
        .unwrap()
}

/// A window "now" can never be inside for the next hour.
fn window_away_from_now() -> TimeWindow {
    let now = Local::now().time();
    let start = now.overflowing_add_signed(chrono::Duration::hours(2)).0;
    let end = now.overflowing_add_signed(chrono::Duration::hours(3)).0;
    TimeWindow::parse(&start.format("%H:%M").to_string(), &end.format("%H:%M").to_string())
        .unwrap()
}

fn t(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M:%S").unwrap()
}

#[test]
fn window_containment_without_wrap() {
    let window = TimeWindow::parse("08:00", "18:00").unwrap();
    assert!(window.contains(t("09:00:00")));
    assert!(window.contains(t("08:00:00")));
    assert!(window.contains(t("18:00:00")));
    assert!(!window.contains(t("20:00:00")));
    assert!(!window.contains(t("07:59:59")));
}

#[test]
fn window_containment_wrapping_midnight() {
    let window = TimeWindow::parse("22:00", "06:00").unwrap();
    assert!(window.contains(t("23:30:00")));
    assert!(window.contains(t("01:00:00")));
    assert!(!window.contains(t("12:00:00")));
}

#[test]
fn window_rejects_malformed_times() {
    assert!(TimeWindow::parse("8 o'clock", "18:00").is_err());
    assert!(TimeWindow::parse("08:00", "25:99").is_err());
}

#[test]
fn digital_render_is_pure_and_visible() {
    let a = render_digital("12:34:56", 64, 64);
    let b = render_digital("12:34:56", 64, 64);
    assert_eq!(a.dimensions(), (64, 64));
    assert_eq!(a.as_raw(), b.as_raw());
    assert!(a.pixels().any(|p| p.0[0] == 255));

    // A different second renders a different image.
    let c = render_digital("12:34:57", 64, 64);
    assert_ne!(a.as_raw(), c.as_raw());
}

#[test]
fn analog_render_is_pure_and_visible() {
    let time = t("10:09:30");
    let a = render_analog(time, 64, 64);
    let b = render_analog(time, 64, 64);
    assert_eq!(a.dimensions(), (64, 64));
    assert_eq!(a.as_raw(), b.as_raw());
    assert!(a.pixels().any(|p| p.0[0] > 200));

    // Dial background is opaque black, far from the rim.
    assert!(a.get_pixel(0, 0).0[0] <= 5);
}

#[test]
#[serial]
fn clock_renders_inside_window_and_stops_cleanly() {
    let (server, channel) = test_channel();
    let clock = Clock::new(channel, ClockKind::Digital, window_around_now(), true);

    clock.start();
    assert!(clock.is_running());
    let frame = try_recv_frame(&server).expect("no clock frame within timeout");
    assert!(!is_blank(&frame));

    // Second start is a no-op.
    clock.start();
    assert!(clock.is_running());

    clock.stop();
    assert!(!clock.is_running());

    // The stop cleared the channel; drain until we see the blank frame.
    let mut saw_clear = false;
    while let Some(frame) = try_recv_frame(&server) {
        if is_blank(&frame) {
            saw_clear = true;
            break;
        }
    }
    assert!(saw_clear, "stop() did not clear the channel");

    // Loop has exited: no further frames even after the next second rolls by.
    assert!(try_recv_frame(&server).is_none());

    // Stopping again is a no-op.
    clock.stop();
}

#[test]
#[serial]
fn clock_blanks_outside_window() {
    let (server, channel) = test_channel();
    let clock = Clock::new(channel, ClockKind::Digital, window_away_from_now(), true);

    clock.start();
    let frame = try_recv_frame(&server).expect("no frame within timeout");
    assert!(is_blank(&frame), "clock rendered outside its window");
    clock.stop();
}

#[test]
fn disabled_clock_never_starts() {
    let (server, channel) = test_channel();
    let clock = Clock::new(channel, ClockKind::Digital, window_around_now(), false);

    clock.start();
    assert!(!clock.is_running());
    server
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    assert!(try_recv_frame(&server).is_none());
    clock.stop();
}
