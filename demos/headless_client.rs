//! Headless RFB client example: connects to an upstream VNC server and logs
//! the rectangles it paints instead of drawing them anywhere.
//!
//! Usage:
//!   cargo run --example headless_client -- 127.0.0.1 5900 secret

use std::env;
use std::error::Error;

use rfb_client_bridge::{HostCallbacks, MsgLevel, Session};

struct LoggingCallbacks {
    rects_painted: u64,
}

impl HostCallbacks for LoggingCallbacks {
    fn begin_update(&mut self) {}

    fn end_update(&mut self) {
        println!("update complete, {} rectangles painted so far", self.rects_painted);
    }

    fn paint_rect(
        &mut self,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        _bytes: &[u8],
        _stride_w: u16,
        _stride_h: u16,
        _src_x: u16,
        _src_y: u16,
    ) {
        self.rects_painted += 1;
        println!("paint_rect {w}x{h} at ({x}, {y})");
    }

    fn screen_blt(&mut self, dst_x: u16, dst_y: u16, w: u16, h: u16, src_x: u16, src_y: u16) {
        println!("copyrect {w}x{h} from ({src_x}, {src_y}) to ({dst_x}, {dst_y})");
    }

    fn set_cursor(&mut self, hot_x: u8, hot_y: u8, _data: &[u8], _mask: &[u8]) {
        println!("set_cursor hotspot ({hot_x}, {hot_y})");
    }

    fn palette(&mut self, _argb_table: &[u32; 256]) {
        println!("palette updated");
    }

    fn bell(&mut self) {
        println!("bell");
    }

    fn msg(&mut self, text: &str, level: MsgLevel) {
        println!("[{level:?}] {text}");
    }

    fn reset(&mut self, w: u16, h: u16, bpp: u8) {
        println!("reset to {w}x{h} @ {bpp}bpp");
    }

    fn set_fgcolor(&mut self, _color: u32) {}

    fn fill_rect(&mut self, x: u16, y: u16, w: u16, h: u16) {
        println!("fill_rect {w}x{h} at ({x}, {y})");
    }

    fn send_to_channel(&mut self, chan: u32, bytes: &[u8], _len: u32, _total: u32, _flags: u32) {
        println!("send_to_channel {chan}: {} bytes", bytes.len());
    }

    fn get_channel_id(&mut self, name: &str) -> Option<u32> {
        if name == "cliprdr" {
            Some(1)
        } else {
            None
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let ip = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = args.next().and_then(|s| s.parse().ok()).unwrap_or(5900);
    let password = args.next().unwrap_or_default();

    let callbacks = LoggingCallbacks { rects_painted: 0 };
    let mut session = Session::init(Box::new(callbacks));
    session.set_param("ip", &ip);
    session.set_param("port", &port.to_string());
    session.set_param("password", &password);
    session.start(1280, 720, 32)?;
    session.connect()?;

    println!("connected to {ip}:{port}, servicing updates (Ctrl+C to stop)");
    loop {
        session.check_wait_objs()?;
    }
}
