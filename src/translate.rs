//! Deferred translation of legacy cursor requests
//!
//! Setting a bitmap cursor is not one request but a short sequence:
//!
//! ```text
//! wl_pointer.set_cursor(serial, surface, x, y)
//! wl_surface.attach(surface, buffer)
//! wl_surface.set_buffer_scale(surface, ...)   (optional)
//! wl_surface.damage(surface, ...)
//! wl_surface.commit(surface)
//! ```
//!
//! Whether this can become a single `wp_cursor_shape_device_v1.set_shape` is only known once
//! the attached buffer is seen. The [`Translator`] therefore holds a `set_cursor` back for
//! exactly one request per thread. If the following `attach` shows a buffer with a known shape,
//! the shape is set and the rest of the sequence on the cursor surface is swallowed up to and
//! including the `commit`. Anything else causes the held request to be replayed unchanged
//! before the request that interrupted it, so the compositor sees the original sequence.
//!
//! Every intercepted request goes through [`Translator::intercept`], which evaluates in this
//! order:
//!
//! 1. requests on the held cursor surface (`attach`, `set_buffer_scale`, `damage`, `commit`),
//! 2. replay of a still-held `set_cursor`,
//! 3. capture of a new `set_cursor`,
//! 4. forwarding of anything else.

use std::cell::Cell;

use tracing::{debug, trace};

use crate::cache::{DeviceKind, IdentityCaches, ShapeDeviceFactory};
use crate::shape::Shape;
use crate::utils::{BufferHandle, DisplayHandle, ObjectHandle, ShapeDeviceHandle};

thread_local! {
    static PENDING: Cell<Option<PendingCursorSet>> = const { Cell::new(None) };
}

/// A legacy `set_cursor` request, as captured from the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCursorSet {
    /// The `wl_pointer` or `zwp_tablet_tool_v2` the request was sent on
    pub device: ObjectHandle,
    /// What kind of object `device` is
    pub kind: DeviceKind,
    /// Version of the proxy the request was marshalled with
    pub version: u32,
    /// Serial of the enter event the cursor is set for
    pub serial: u32,
    /// The cursor surface, `None` to hide the cursor
    pub surface: Option<ObjectHandle>,
    /// Hotspot x coordinate, surface local
    pub hotspot_x: i32,
    /// Hotspot y coordinate, surface local
    pub hotspot_y: i32,
}

/// Surface requests the translator cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRequest {
    /// `wl_surface.attach`, with the attached buffer
    Attach(Option<BufferHandle>),
    /// `wl_surface.set_buffer_scale`
    SetBufferScale,
    /// `wl_surface.damage` or `wl_surface.damage_buffer`
    Damage,
    /// `wl_surface.commit`
    Commit,
    /// Any other `wl_surface` request
    Other,
}

/// An outbound request, reduced to what the translator needs to know
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// A legacy `set_cursor` on a pointer or tablet tool
    SetCursor(PendingCursorSet),
    /// A request on a `wl_surface`
    Surface {
        /// The surface the request is sent on
        surface: ObjectHandle,
        /// Which request it is
        request: SurfaceRequest,
    },
    /// Anything else
    Other,
}

/// What the interception point should do with the request it just passed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the request to the real implementation
    Forward,
    /// Drop the request, it has been captured or replaced
    Suppress,
}

/// Request kinds as identified by interface name and opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `set_cursor` on a pointer or tablet tool
    SetCursor(DeviceKind),
    /// `wl_surface.attach`
    Attach,
    /// `wl_surface.set_buffer_scale`
    SetBufferScale,
    /// `wl_surface.damage` or `wl_surface.damage_buffer`
    Damage,
    /// `wl_surface.commit`
    Commit,
    /// Another `wl_surface` request
    OtherSurface,
    /// Not a request the translator looks at
    Other,
}

/// Identifies a request from the interface name of its proxy and its opcode
pub fn classify(interface: &[u8], opcode: u32) -> RequestKind {
    match (interface, opcode) {
        (b"wl_pointer", 0) => RequestKind::SetCursor(DeviceKind::Pointer),
        (b"zwp_tablet_tool_v2", 0) => RequestKind::SetCursor(DeviceKind::TabletTool),
        (b"wl_surface", 1) => RequestKind::Attach,
        (b"wl_surface", 2) | (b"wl_surface", 9) => RequestKind::Damage,
        (b"wl_surface", 6) => RequestKind::Commit,
        (b"wl_surface", 8) => RequestKind::SetBufferScale,
        (b"wl_surface", _) => RequestKind::OtherSurface,
        _ => RequestKind::Other,
    }
}

/// The protocol library behind the shim
///
/// The translator never talks to libwayland directly, every request it sends goes through this
/// trait.
pub trait Backend: ShapeDeviceFactory {
    /// The display connection `object` belongs to
    fn display_of(&self, object: ObjectHandle) -> DisplayHandle;

    /// Sends a captured `set_cursor` unchanged
    fn replay_set_cursor(&self, request: &PendingCursorSet);

    /// Sends `wp_cursor_shape_device_v1.set_shape`
    fn set_shape(&self, device: ShapeDeviceHandle, serial: u32, shape: Shape);

    /// Resolves a buffer the caches know nothing about, through the toolkit fallback
    fn toolkit_buffer_shape(&self, _buffer: BufferHandle) -> Option<Shape> {
        None
    }
}

#[cfg(test)]
fn has_pending() -> bool {
    PENDING.with(|slot| {
        let pending = slot.take();
        slot.set(pending);
        pending.is_some()
    })
}

/// The per-thread deferred translation state machine
#[derive(Debug)]
pub struct Translator<'a, B: ?Sized> {
    caches: &'a IdentityCaches,
    backend: &'a B,
}

impl<'a, B: Backend + ?Sized> Translator<'a, B> {
    /// Creates a translator working on `caches`, sending through `backend`
    pub fn new(caches: &'a IdentityCaches, backend: &'a B) -> Self {
        Translator { caches, backend }
    }

    /// Runs one intercepted request through the calling thread's state machine
    pub fn intercept(&self, request: &Request) -> Verdict {
        PENDING.with(|slot| {
            let mut pending = slot.take();
            let verdict = self.step(&mut pending, request);
            slot.set(pending);
            verdict
        })
    }

    /// Replays a held `set_cursor` naming `object`, which is about to be destroyed
    pub fn release_object(&self, object: ObjectHandle) {
        PENDING.with(|slot| match slot.take() {
            Some(held) if held.device == object || held.surface == Some(object) => {
                debug!(?object, "Flushing deferred set_cursor before destruction");
                self.backend.replay_set_cursor(&held);
            }
            other => slot.set(other),
        })
    }

    /// Drops a held `set_cursor` sent on `display`, which is being disconnected
    pub fn discard_display(&self, wl_display: DisplayHandle) {
        PENDING.with(|slot| match slot.take() {
            Some(held) if self.backend.display_of(held.device) == wl_display => {
                trace!(?wl_display, "Dropping deferred set_cursor of disconnected display");
            }
            other => slot.set(other),
        })
    }

    fn step(&self, pending: &mut Option<PendingCursorSet>, request: &Request) -> Verdict {
        if let (Some(held), Request::Surface { surface, request }) = (*pending, request) {
            if held.surface == Some(*surface) {
                match request {
                    SurfaceRequest::Attach(buffer) => {
                        if self.rewrite(&held, *buffer) {
                            return Verdict::Suppress;
                        }
                    }
                    SurfaceRequest::SetBufferScale | SurfaceRequest::Damage => {
                        return Verdict::Suppress;
                    }
                    SurfaceRequest::Commit => {
                        *pending = None;
                        return Verdict::Suppress;
                    }
                    SurfaceRequest::Other => {}
                }
            }
        }

        if let Some(held) = pending.take() {
            debug!(device = ?held.device, serial = held.serial, "Flushing deferred set_cursor");
            self.backend.replay_set_cursor(&held);
        }

        if let Request::SetCursor(set_cursor) = request {
            if set_cursor.surface.is_some() {
                trace!(device = ?set_cursor.device, serial = set_cursor.serial, "Deferring set_cursor");
                *pending = Some(*set_cursor);
                return Verdict::Suppress;
            }
        }

        Verdict::Forward
    }

    fn resolve_buffer(&self, buffer: BufferHandle) -> Option<Shape> {
        self.caches
            .lookup_buffer_shape(buffer)
            .or_else(|| self.backend.toolkit_buffer_shape(buffer))
    }

    // Sends set_shape in place of the attached buffer, if both a shape and a shape device are
    // available.
    fn rewrite(&self, held: &PendingCursorSet, buffer: Option<BufferHandle>) -> bool {
        let Some(buffer) = buffer else {
            return false;
        };
        let Some(shape) = self.resolve_buffer(buffer) else {
            debug!(?buffer, "No shape found for buffer");
            return false;
        };
        let wl_display = self.backend.display_of(held.device);
        let Some(device) = self
            .caches
            .get_or_create_shape_device(held.device, wl_display, held.kind, self.backend)
        else {
            debug!(device = ?held.device, ?wl_display, "No shape device available");
            return false;
        };

        debug!(?buffer, ?shape, ?device, "Mapped cursor buffer to shape");
        self.backend.set_shape(device, held.serial, shape);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManagerHandle;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        SetCursor(PendingCursorSet),
        SetShape(ShapeDeviceHandle, u32, Shape),
        CreateDevice(ObjectHandle, DeviceKind),
        DestroyDevice(ShapeDeviceHandle),
        DestroyManager(ManagerHandle),
        Forwarded(Request),
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Sent>>,
        toolkit: Option<(BufferHandle, Shape)>,
    }

    impl Recorder {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl ShapeDeviceFactory for Recorder {
        fn create_shape_device(
            &self,
            _manager: ManagerHandle,
            object: ObjectHandle,
            kind: DeviceKind,
        ) -> Option<ShapeDeviceHandle> {
            self.sent.lock().unwrap().push(Sent::CreateDevice(object, kind));
            Some(SHAPE_DEVICE)
        }

        fn destroy_shape_device(&self, device: ShapeDeviceHandle) {
            self.sent.lock().unwrap().push(Sent::DestroyDevice(device));
        }

        fn destroy_shape_manager(&self, manager: ManagerHandle) {
            self.sent.lock().unwrap().push(Sent::DestroyManager(manager));
        }
    }

    impl Backend for Recorder {
        fn display_of(&self, _object: ObjectHandle) -> DisplayHandle {
            DISPLAY
        }

        fn replay_set_cursor(&self, request: &PendingCursorSet) {
            self.sent.lock().unwrap().push(Sent::SetCursor(*request));
        }

        fn set_shape(&self, device: ShapeDeviceHandle, serial: u32, shape: Shape) {
            self.sent.lock().unwrap().push(Sent::SetShape(device, serial, shape));
        }

        fn toolkit_buffer_shape(&self, buffer: BufferHandle) -> Option<Shape> {
            self.toolkit.filter(|(b, _)| *b == buffer).map(|(_, shape)| shape)
        }
    }

    const DISPLAY: DisplayHandle = DisplayHandle::from_raw(0x100);
    const POINTER: ObjectHandle = ObjectHandle::from_raw(0x300);
    const SURFACE: ObjectHandle = ObjectHandle::from_raw(0x400);
    const OTHER_SURFACE: ObjectHandle = ObjectHandle::from_raw(0x401);
    const KNOWN: BufferHandle = BufferHandle::from_raw(0x500);
    const UNKNOWN: BufferHandle = BufferHandle::from_raw(0x501);
    const SHAPE_DEVICE: ShapeDeviceHandle = ShapeDeviceHandle::from_raw(0x600);

    fn set_cursor(kind: DeviceKind, surface: Option<ObjectHandle>) -> PendingCursorSet {
        PendingCursorSet {
            device: POINTER,
            kind,
            version: 9,
            serial: 42,
            surface,
            hotspot_x: 3,
            hotspot_y: 4,
        }
    }

    fn on_surface(request: SurfaceRequest) -> Request {
        Request::Surface {
            surface: SURFACE,
            request,
        }
    }

    fn caches_with_manager() -> IdentityCaches {
        let caches = IdentityCaches::new();
        caches.register_shape_manager(DISPLAY, ManagerHandle::from_raw(0x200));
        caches.register_buffer_shape(KNOWN, Shape::Pointer);
        caches
    }

    // Drives the translator the way the hooks do: forwarded requests end up on the wire.
    fn run(translator: &Translator<'_, Recorder>, recorder: &Recorder, requests: &[Request]) {
        for request in requests {
            if translator.intercept(request) == Verdict::Forward {
                recorder.sent.lock().unwrap().push(Sent::Forwarded(*request));
            }
        }
    }

    // Each test runs on its own thread, so the thread local slot starts out empty.

    #[test]
    fn known_buffer_becomes_set_shape() {
        let caches = caches_with_manager();
        let recorder = Recorder::default();
        let translator = Translator::new(&caches, &recorder);

        run(
            &translator,
            &recorder,
            &[
                Request::SetCursor(set_cursor(DeviceKind::Pointer, Some(SURFACE))),
                on_surface(SurfaceRequest::Attach(Some(KNOWN))),
                on_surface(SurfaceRequest::SetBufferScale),
                on_surface(SurfaceRequest::Damage),
                on_surface(SurfaceRequest::Commit),
            ],
        );

        assert_eq!(
            recorder.sent(),
            vec![
                Sent::CreateDevice(POINTER, DeviceKind::Pointer),
                Sent::SetShape(SHAPE_DEVICE, 42, Shape::Pointer),
            ]
        );
        assert!(!has_pending());
    }

    #[test]
    fn unknown_buffer_replays_legacy_sequence() {
        let caches = caches_with_manager();
        let recorder = Recorder::default();
        let translator = Translator::new(&caches, &recorder);
        let captured = set_cursor(DeviceKind::Pointer, Some(SURFACE));

        run(
            &translator,
            &recorder,
            &[
                Request::SetCursor(captured),
                on_surface(SurfaceRequest::Attach(Some(UNKNOWN))),
                on_surface(SurfaceRequest::SetBufferScale),
                on_surface(SurfaceRequest::Damage),
                on_surface(SurfaceRequest::Commit),
            ],
        );

        assert_eq!(
            recorder.sent(),
            vec![
                Sent::SetCursor(captured),
                Sent::Forwarded(on_surface(SurfaceRequest::Attach(Some(UNKNOWN)))),
                Sent::Forwarded(on_surface(SurfaceRequest::SetBufferScale)),
                Sent::Forwarded(on_surface(SurfaceRequest::Damage)),
                Sent::Forwarded(on_surface(SurfaceRequest::Commit)),
            ]
        );
        let Sent::SetCursor(replayed) = recorder.sent()[0] else {
            unreachable!()
        };
        assert_eq!((replayed.serial, replayed.hotspot_x, replayed.hotspot_y), (42, 3, 4));
    }

    #[test]
    fn unrelated_request_flushes_first() {
        let caches = caches_with_manager();
        let recorder = Recorder::default();
        let translator = Translator::new(&caches, &recorder);
        let captured = set_cursor(DeviceKind::Pointer, Some(SURFACE));

        run(
            &translator,
            &recorder,
            &[Request::SetCursor(captured), Request::Other],
        );

        assert_eq!(
            recorder.sent(),
            vec![Sent::SetCursor(captured), Sent::Forwarded(Request::Other)]
        );
        assert!(!has_pending());
    }

    #[test]
    fn requests_on_other_surfaces_flush() {
        let caches = caches_with_manager();
        let recorder = Recorder::default();
        let translator = Translator::new(&caches, &recorder);
        let captured = set_cursor(DeviceKind::Pointer, Some(SURFACE));
        let elsewhere = Request::Surface {
            surface: OTHER_SURFACE,
            request: SurfaceRequest::Commit,
        };

        run(&translator, &recorder, &[Request::SetCursor(captured), elsewhere]);

        assert_eq!(
            recorder.sent(),
            vec![Sent::SetCursor(captured), Sent::Forwarded(elsewhere)]
        );
    }

    #[test]
    fn scale_and_damage_are_masked_before_attach() {
        let caches = caches_with_manager();
        let recorder = Recorder::default();
        let translator = Translator::new(&caches, &recorder);

        let captured = Request::SetCursor(set_cursor(DeviceKind::Pointer, Some(SURFACE)));
        assert_eq!(translator.intercept(&captured), Verdict::Suppress);
        assert_eq!(
            translator.intercept(&on_surface(SurfaceRequest::SetBufferScale)),
            Verdict::Suppress
        );
        assert_eq!(
            translator.intercept(&on_surface(SurfaceRequest::Damage)),
            Verdict::Suppress
        );
        assert!(has_pending());
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn commit_closes_the_transaction() {
        let caches = caches_with_manager();
        let recorder = Recorder::default();
        let translator = Translator::new(&caches, &recorder);

        run(
            &translator,
            &recorder,
            &[
                Request::SetCursor(set_cursor(DeviceKind::Pointer, Some(SURFACE))),
                on_surface(SurfaceRequest::Commit),
                on_surface(SurfaceRequest::Commit),
            ],
        );

        // the first commit is swallowed with the transaction, the second one is ordinary
        assert_eq!(
            recorder.sent(),
            vec![Sent::Forwarded(on_surface(SurfaceRequest::Commit))]
        );
    }

    #[test]
    fn consecutive_set_cursor_replays_the_first() {
        let caches = caches_with_manager();
        let recorder = Recorder::default();
        let translator = Translator::new(&caches, &recorder);
        let first = set_cursor(DeviceKind::Pointer, Some(SURFACE));
        let second = PendingCursorSet {
            serial: 43,
            ..first
        };

        run(
            &translator,
            &recorder,
            &[Request::SetCursor(first), Request::SetCursor(second)],
        );

        assert_eq!(recorder.sent(), vec![Sent::SetCursor(first)]);
        assert!(has_pending());
    }

    #[test]
    fn hiding_the_cursor_is_forwarded() {
        let caches = caches_with_manager();
        let recorder = Recorder::default();
        let translator = Translator::new(&caches, &recorder);
        let hide = Request::SetCursor(set_cursor(DeviceKind::Pointer, None));

        run(&translator, &recorder, &[hide]);

        assert_eq!(recorder.sent(), vec![Sent::Forwarded(hide)]);
        assert!(!has_pending());
    }

    #[test]
    fn missing_manager_falls_back_to_legacy() {
        let caches = IdentityCaches::new();
        caches.register_buffer_shape(KNOWN, Shape::Pointer);
        let recorder = Recorder::default();
        let translator = Translator::new(&caches, &recorder);
        let captured = set_cursor(DeviceKind::Pointer, Some(SURFACE));

        run(
            &translator,
            &recorder,
            &[
                Request::SetCursor(captured),
                on_surface(SurfaceRequest::Attach(Some(KNOWN))),
            ],
        );

        assert_eq!(
            recorder.sent(),
            vec![
                Sent::SetCursor(captured),
                Sent::Forwarded(on_surface(SurfaceRequest::Attach(Some(KNOWN)))),
            ]
        );
    }

    #[test]
    fn tablet_tool_uses_toolkit_fallback() {
        let caches = caches_with_manager();
        let recorder = Recorder {
            toolkit: Some((UNKNOWN, Shape::Text)),
            ..Default::default()
        };
        let translator = Translator::new(&caches, &recorder);

        run(
            &translator,
            &recorder,
            &[
                Request::SetCursor(set_cursor(DeviceKind::TabletTool, Some(SURFACE))),
                on_surface(SurfaceRequest::Attach(Some(UNKNOWN))),
                on_surface(SurfaceRequest::Commit),
            ],
        );

        assert_eq!(
            recorder.sent(),
            vec![
                Sent::CreateDevice(POINTER, DeviceKind::TabletTool),
                Sent::SetShape(SHAPE_DEVICE, 42, Shape::Text),
            ]
        );
    }

    #[test]
    fn threads_do_not_share_pending_state() {
        let caches = caches_with_manager();
        let recorder = Recorder::default();
        let translator = Translator::new(&caches, &recorder);

        let captured = Request::SetCursor(set_cursor(DeviceKind::Pointer, Some(SURFACE)));
        assert_eq!(translator.intercept(&captured), Verdict::Suppress);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                assert!(!has_pending());
                assert_eq!(translator.intercept(&Request::Other), Verdict::Forward);
            });
        });

        assert!(recorder.sent().is_empty());
        assert!(has_pending());
    }

    #[test]
    fn destruction_settles_the_held_request() {
        let caches = caches_with_manager();
        let recorder = Recorder::default();
        let translator = Translator::new(&caches, &recorder);
        let captured = set_cursor(DeviceKind::Pointer, Some(SURFACE));

        run(&translator, &recorder, &[Request::SetCursor(captured)]);
        translator.release_object(OTHER_SURFACE);
        assert!(has_pending());
        translator.release_object(SURFACE);
        assert!(!has_pending());
        assert_eq!(recorder.sent(), vec![Sent::SetCursor(captured)]);

        run(&translator, &recorder, &[Request::SetCursor(captured)]);
        translator.discard_display(DisplayHandle::from_raw(0x999));
        assert!(has_pending());
        translator.discard_display(DISPLAY);
        assert!(!has_pending());
        assert_eq!(recorder.sent(), vec![Sent::SetCursor(captured)]);
    }

    #[test]
    fn classification() {
        assert_eq!(classify(b"wl_pointer", 0), RequestKind::SetCursor(DeviceKind::Pointer));
        assert_eq!(classify(b"wl_pointer", 1), RequestKind::Other);
        assert_eq!(
            classify(b"zwp_tablet_tool_v2", 0),
            RequestKind::SetCursor(DeviceKind::TabletTool)
        );
        assert_eq!(classify(b"wl_surface", 1), RequestKind::Attach);
        assert_eq!(classify(b"wl_surface", 2), RequestKind::Damage);
        assert_eq!(classify(b"wl_surface", 9), RequestKind::Damage);
        assert_eq!(classify(b"wl_surface", 6), RequestKind::Commit);
        assert_eq!(classify(b"wl_surface", 8), RequestKind::SetBufferScale);
        assert_eq!(classify(b"wl_surface", 3), RequestKind::OtherSurface);
        assert_eq!(classify(b"wl_buffer", 0), RequestKind::Other);
    }
}
