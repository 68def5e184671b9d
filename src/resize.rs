//! Dynamic-resize / multi-monitor negotiation sub-state-machine (spec §4.F).
//!
//! Layered on top of framebuffer updates: while negotiating, the session
//! only asks the server for a throwaway 1x1 rectangle and hands every
//! `ExtendedDesktopSize` rectangle it sees to [`ResizeNegotiator`] instead of
//! painting anything.

use bytes::{BufMut, BytesMut};
use log::{info, warn};

use crate::protocol::{eds_status_message, CLIENT_MSG_SET_DESKTOP_SIZE};
use crate::screen::ScreenLayout;

/// State of the negotiation sub-machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeState {
    WaitingFirstUpdate,
    WaitingResizeConfirm,
    Done,
}

/// An `ExtendedDesktopSize` rectangle as seen by the negotiator: the
/// overloaded `(x, y, w, h)` fields decoded as `(origin, status, total_w,
/// total_h)` (spec §9 "ExtendedDesktopSize overloading"), plus the screen
/// list it carries.
#[derive(Debug, Clone)]
pub struct EdsRect {
    /// Rectangle `x`: 0 = initial announce, 1 = reply-to-us, 2 =
    /// reply-to-other-client, anything else treated as an initial announce.
    pub origin: u16,
    /// Rectangle `y`: the status code when `origin == 1`, otherwise unused.
    pub status: u16,
    pub total_width: u16,
    pub total_height: u16,
    pub layout: ScreenLayout,
}

/// What the session should do after feeding an update's rectangles to the
/// negotiator.
#[derive(Debug, Default)]
pub struct NegotiationOutcome {
    /// A `SetDesktopSize` message to write to the server.
    pub set_desktop_size: Option<Vec<u8>>,
    /// Resize the downstream client to these dimensions (fallback path).
    pub reset_downstream: Option<(u16, u16)>,
    /// What follow-up `FramebufferUpdateRequest` to send, if any.
    pub next_request: Option<UpdateRequestShape>,
}

/// The shape of the follow-up update request a negotiation step wants sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRequestShape {
    /// Full update over `(0,0,1,1)` — used entering `WaitingFirstUpdate`.
    FullTiny,
    /// Incremental update over `(0,0,1,1)` — used entering `WaitingResizeConfirm`.
    IncrementalTiny,
}

/// Drives the three-state resize negotiation sub-machine.
pub struct ResizeNegotiator {
    state: ResizeState,
    client_layout: ScreenLayout,
}

impl ResizeNegotiator {
    /// A fresh negotiator in `WaitingFirstUpdate`, with the downstream
    /// client's desired single-screen layout.
    pub fn new(client_layout: ScreenLayout) -> Self {
        Self {
            state: ResizeState::WaitingFirstUpdate,
            client_layout,
        }
    }

    pub fn state(&self) -> ResizeState {
        self.state
    }

    pub fn client_layout(&self) -> &ScreenLayout {
        &self.client_layout
    }

    /// Resets to `WaitingFirstUpdate` with a new single-screen client
    /// layout (spec §6 `server_monitor_resize`).
    pub fn restart(&mut self, client_layout: ScreenLayout) {
        self.client_layout = client_layout;
        self.state = ResizeState::WaitingFirstUpdate;
    }

    /// The framebuffer-update-request rectangle to use in the current state
    /// (spec §4.F "Update-request shape by state"). `Done` is handled by the
    /// session's normal steady-state request logic, not here.
    pub fn pending_request_shape(&self) -> Option<UpdateRequestShape> {
        match self.state {
            ResizeState::WaitingFirstUpdate => Some(UpdateRequestShape::FullTiny),
            ResizeState::WaitingResizeConfirm => Some(UpdateRequestShape::IncrementalTiny),
            ResizeState::Done => None,
        }
    }

    /// Feeds the `ExtendedDesktopSize` rectangles observed in one
    /// `FramebufferUpdate` to the negotiator. `server_dims` is the
    /// currently-known server geometry, used as the fallback target.
    ///
    /// No-op (returns an empty outcome) once `state == Done`; the session
    /// handles later resize rectangles directly per spec §4.G.
    pub fn handle_update(&mut self, eds_rects: &[EdsRect], server_dims: (u16, u16)) -> NegotiationOutcome {
        match self.state {
            ResizeState::WaitingFirstUpdate => self.handle_waiting_first_update(eds_rects, server_dims),
            ResizeState::WaitingResizeConfirm => self.handle_waiting_resize_confirm(eds_rects, server_dims),
            ResizeState::Done => NegotiationOutcome::default(),
        }
    }

    fn handle_waiting_first_update(
        &mut self,
        eds_rects: &[EdsRect],
        server_dims: (u16, u16),
    ) -> NegotiationOutcome {
        let announce = eds_rects.iter().find(|r| r.origin != 1 && r.origin != 2);

        let Some(announce) = announce else {
            // Server doesn't support resize: fall back to its geometry.
            info!("resize: server sent no ExtendedDesktopSize, adopting server geometry");
            self.state = ResizeState::Done;
            return NegotiationOutcome {
                set_desktop_size: None,
                reset_downstream: Some(server_dims),
                next_request: None,
            };
        };

        let mut server_layout = announce.layout.clone();
        if server_layout.is_single_screen() && self.client_layout.is_single_screen() {
            let server_screen = server_layout.screens[0];
            self.client_layout = ScreenLayout::single(
                server_screen.id,
                self.client_layout.screens[0].width,
                self.client_layout.screens[0].height,
                server_screen.flags,
            );
        }
        server_layout = ScreenLayout::new(
            announce.total_width,
            announce.total_height,
            server_layout.screens,
        );

        if server_layout == self.client_layout {
            info!("resize: server layout already matches the client's, no negotiation needed");
            self.state = ResizeState::Done;
            NegotiationOutcome {
                set_desktop_size: None,
                reset_downstream: None,
                next_request: None,
            }
        } else {
            self.state = ResizeState::WaitingResizeConfirm;
            NegotiationOutcome {
                set_desktop_size: Some(build_set_desktop_size(&self.client_layout)),
                reset_downstream: None,
                next_request: Some(UpdateRequestShape::IncrementalTiny),
            }
        }
    }

    fn handle_waiting_resize_confirm(
        &mut self,
        eds_rects: &[EdsRect],
        server_dims: (u16, u16),
    ) -> NegotiationOutcome {
        let Some(reply) = eds_rects.iter().find(|r| r.origin == 1) else {
            return NegotiationOutcome::default();
        };

        self.state = ResizeState::Done;
        if reply.status == 0 {
            NegotiationOutcome::default()
        } else {
            let msg = eds_status_message(reply.status);
            warn!("resize: server rejected SetDesktopSize: {msg}");
            NegotiationOutcome {
                set_desktop_size: None,
                reset_downstream: Some(server_dims),
                next_request: None,
            }
        }
    }
}

/// Serializes a `SetDesktopSize` request (spec §4.F wire format).
fn build_set_desktop_size(layout: &ScreenLayout) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(8 + layout.count() * 16);
    buf.put_u8(CLIENT_MSG_SET_DESKTOP_SIZE);
    buf.put_u8(0);
    buf.put_u16(layout.total_width);
    buf.put_u16(layout.total_height);
    layout.write_screens(&mut buf);
    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(id: u32, w: u16, h: u16, flags: u32) -> ScreenLayout {
        ScreenLayout::single(id, w, h, flags)
    }

    #[test]
    fn first_update_with_matching_layout_transitions_to_done() {
        let mut neg = ResizeNegotiator::new(single(1, 1920, 1080, 0));
        let rects = vec![EdsRect {
            origin: 0,
            status: 0,
            total_width: 1920,
            total_height: 1080,
            layout: single(1, 1920, 1080, 0),
        }];
        let outcome = neg.handle_update(&rects, (1920, 1080));
        assert_eq!(neg.state(), ResizeState::Done);
        assert!(outcome.set_desktop_size.is_none());
    }

    #[test]
    fn first_update_with_mismatched_layout_requests_resize() {
        // Server's current desktop is 1920x1080; client wants 1280x720.
        let mut neg = ResizeNegotiator::new(single(1, 1280, 720, 0));
        let rects = vec![EdsRect {
            origin: 0,
            status: 0,
            total_width: 1920,
            total_height: 1080,
            layout: single(1, 1920, 1080, 0),
        }];
        let outcome = neg.handle_update(&rects, (1920, 1080));
        assert_eq!(neg.state(), ResizeState::WaitingResizeConfirm);
        assert!(outcome.set_desktop_size.is_some());
        assert_eq!(outcome.next_request, Some(UpdateRequestShape::IncrementalTiny));
    }

    #[test]
    fn first_update_with_no_eds_rect_falls_back_to_server_geometry() {
        let mut neg = ResizeNegotiator::new(single(1, 1280, 720, 0));
        let outcome = neg.handle_update(&[], (1024, 768));
        assert_eq!(neg.state(), ResizeState::Done);
        assert_eq!(outcome.reset_downstream, Some((1024, 768)));
    }

    #[test]
    fn resize_confirm_failure_falls_back_and_warns() {
        let mut neg = ResizeNegotiator::new(single(1, 1280, 720, 0));
        neg.state = ResizeState::WaitingResizeConfirm;
        let rects = vec![EdsRect {
            origin: 1,
            status: 3,
            total_width: 0,
            total_height: 0,
            layout: single(1, 0, 0, 0),
        }];
        let outcome = neg.handle_update(&rects, (1920, 1080));
        assert_eq!(neg.state(), ResizeState::Done);
        assert_eq!(outcome.reset_downstream, Some((1920, 1080)));
    }

    #[test]
    fn resize_confirm_success_transitions_without_reset() {
        let mut neg = ResizeNegotiator::new(single(1, 1280, 720, 0));
        neg.state = ResizeState::WaitingResizeConfirm;
        let rects = vec![EdsRect {
            origin: 1,
            status: 0,
            total_width: 1280,
            total_height: 720,
            layout: single(1, 1280, 720, 0),
        }];
        let outcome = neg.handle_update(&rects, (1920, 1080));
        assert_eq!(neg.state(), ResizeState::Done);
        assert!(outcome.reset_downstream.is_none());
    }

    #[test]
    fn done_state_is_a_no_op() {
        let mut neg = ResizeNegotiator::new(single(1, 1280, 720, 0));
        neg.state = ResizeState::Done;
        let outcome = neg.handle_update(&[], (1920, 1080));
        assert!(outcome.reset_downstream.is_none());
        assert!(outcome.set_desktop_size.is_none());
    }

    #[test]
    fn set_desktop_size_wire_shape() {
        let layout = single(1, 1280, 720, 0);
        let bytes = build_set_desktop_size(&layout);
        assert_eq!(bytes[0], CLIENT_MSG_SET_DESKTOP_SIZE);
        assert_eq!(bytes[1], 0);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 1280);
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 720);
        assert_eq!(bytes[6], 1); // screen count
    }
}
