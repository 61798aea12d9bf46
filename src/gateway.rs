//! Global hotkey gateway.
//!
//! Turns OS-level hotkey presses into the same scheduler commands the UI
//! sends, so both end up in one ordered control channel.

use crate::config::HotkeySettings;
use crate::error::{ClickerError, Result};
use crate::platform::Point;
use crate::scheduler::ClickerHandle;
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Poll period of the hotkey thread. Bounds hotkey-to-command latency.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// External signals the gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Start,
    Stop,
    /// Capture the cursor position for use as a fixed target.
    Pick,
    /// Stop immediately, whatever the scheduler is doing.
    Panic,
}

/// Parsed hotkeys and the signal each one raises.
#[derive(Debug, Clone)]
pub struct HotkeyBindings {
    bindings: Vec<(String, HotKey, Signal)>,
    by_id: HashMap<u32, Signal>,
}

impl HotkeyBindings {
    pub fn from_settings(settings: &HotkeySettings) -> Result<Self> {
        let mut bindings = Vec::with_capacity(4);
        let mut by_id = HashMap::with_capacity(4);

        for (chord, signal) in [
            (&settings.start, Signal::Start),
            (&settings.stop, Signal::Stop),
            (&settings.pick, Signal::Pick),
            (&settings.panic, Signal::Panic),
        ] {
            let hotkey = parse_hotkey(chord)?;
            if by_id.insert(hotkey.id(), signal).is_some() {
                return Err(ClickerError::invalid_hotkey(
                    chord.as_str(),
                    "bound to more than one action",
                ));
            }
            bindings.push((chord.clone(), hotkey, signal));
        }

        Ok(Self { bindings, by_id })
    }

    pub fn signal_for(&self, hotkey_id: u32) -> Option<Signal> {
        self.by_id.get(&hotkey_id).copied()
    }

    pub fn hotkey_for(&self, signal: Signal) -> Option<HotKey> {
        self.bindings
            .iter()
            .find(|(_, _, s)| *s == signal)
            .map(|(_, hotkey, _)| *hotkey)
    }
}

/// Routes signals into a [`ClickerHandle`]. Picks go to a separate channel
/// because they never touch the scheduler.
#[derive(Clone)]
pub struct SignalRouter {
    handle: ClickerHandle,
    picks: mpsc::UnboundedSender<Point>,
}

impl SignalRouter {
    pub fn new(handle: ClickerHandle) -> (Self, mpsc::UnboundedReceiver<Point>) {
        let (picks, picks_rx) = mpsc::unbounded_channel();
        (Self { handle, picks }, picks_rx)
    }

    pub fn dispatch(&self, signal: Signal) -> Result<()> {
        debug!("hotkey signal: {:?}", signal);
        match signal {
            Signal::Start => self.handle.start_staged(),
            Signal::Stop => self.handle.stop(),
            Signal::Panic => self.handle.panic(),
            Signal::Pick => {
                let point = self.handle.pick_current_position()?;
                // Nobody listening for picks is not an error.
                let _ = self.picks.send(point);
                Ok(())
            }
        }
    }
}

/// Forward one hotkey event to `router`. Returns the signal it raised, if any.
pub fn handle_hotkey(
    bindings: &HotkeyBindings,
    router: &SignalRouter,
    hotkey_id: u32,
    state: HotKeyState,
) -> Option<Signal> {
    if state != HotKeyState::Pressed {
        return None;
    }
    let signal = bindings.signal_for(hotkey_id)?;
    if let Err(e) = router.dispatch(signal) {
        warn!("failed to handle {:?} hotkey: {}", signal, e);
    }
    Some(signal)
}

/// Owns the hotkey thread. The OS registrations live on that thread, which
/// also pumps its native message queue, since Windows only delivers hotkey
/// messages to the thread that registered them. Dropping the gateway stops
/// the thread and unregisters everything.
///
/// On macOS the `global-hotkey` crate expects the manager on the main thread
/// with a running app event loop, so this gateway does not receive hotkeys
/// there; use `--no-hotkeys` instead.
pub struct HotkeyGateway {
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl HotkeyGateway {
    /// Spawn the hotkey thread and register every binding on it. Fails if
    /// the manager cannot be created or any hotkey cannot be registered.
    pub fn start(bindings: HotkeyBindings, router: SignalRouter) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let stop = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("hotkeys".to_string())
            .spawn(move || hotkey_thread(bindings, router, stop, ready_tx))
            .map_err(|e| ClickerError::hotkey(format!("failed to spawn hotkey thread: {}", e)))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(ClickerError::hotkey("hotkey thread exited during setup")));
        if let Err(e) = ready {
            let _ = thread.join();
            return Err(e);
        }

        Ok(Self {
            shutdown,
            thread: Some(thread),
        })
    }

    /// Stop the hotkey thread and wait for it to unregister.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("hotkey thread panicked");
            }
        }
    }
}

impl Drop for HotkeyGateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn hotkey_thread(
    bindings: HotkeyBindings,
    router: SignalRouter,
    shutdown: Arc<AtomicBool>,
    ready: std_mpsc::Sender<Result<()>>,
) {
    let manager = match register_all(&bindings) {
        Ok(manager) => manager,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let receiver = GlobalHotKeyEvent::receiver();
    while !shutdown.load(Ordering::Relaxed) {
        pump_messages();
        while let Ok(event) = receiver.try_recv() {
            handle_hotkey(&bindings, &router, event.id, event.state);
        }
        thread::sleep(POLL_INTERVAL);
    }

    for (chord, hotkey, _) in &bindings.bindings {
        if let Err(e) = manager.unregister(*hotkey) {
            debug!("failed to unregister '{}': {}", chord, e);
        }
    }
    debug!("hotkey thread stopped");
}

fn register_all(bindings: &HotkeyBindings) -> Result<GlobalHotKeyManager> {
    let manager = GlobalHotKeyManager::new()
        .map_err(|e| ClickerError::hotkey(format!("failed to create hotkey manager: {}", e)))?;

    for (chord, hotkey, signal) in &bindings.bindings {
        manager.register(*hotkey).map_err(|e| {
            ClickerError::hotkey(format!("failed to register '{}': {}", chord, e))
        })?;
        info!("{:?} hotkey '{}' registered", signal, chord);
    }
    Ok(manager)
}

/// Dispatch queued window messages so WM_HOTKEY reaches the manager.
#[cfg(windows)]
fn pump_messages() {
    use winapi::um::winuser::{DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE};

    // SAFETY: MSG is plain data; the calls only touch this thread's queue.
    unsafe {
        let mut msg: MSG = std::mem::zeroed();
        while PeekMessageW(&mut msg, std::ptr::null_mut(), 0, 0, PM_REMOVE) != 0 {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

#[cfg(not(windows))]
fn pump_messages() {}

/// Parse a chord such as `"ctrl+alt+f5"` or `"escape"`.
pub fn parse_hotkey(hotkey_str: &str) -> Result<HotKey> {
    let binding = hotkey_str.to_lowercase();
    let parts: Vec<&str> = binding.split('+').map(|s| s.trim()).collect();

    let mut modifiers = Modifiers::empty();
    let mut key_code = None;

    for part in &parts {
        match *part {
            "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
            "alt" | "option" => modifiers |= Modifiers::ALT,
            "shift" => modifiers |= Modifiers::SHIFT,
            "meta" | "cmd" | "super" => modifiers |= Modifiers::SUPER,
            "" => {
                return Err(ClickerError::invalid_hotkey(hotkey_str, "empty key"));
            }
            key => {
                if key_code.is_some() {
                    return Err(ClickerError::invalid_hotkey(
                        hotkey_str,
                        "more than one key specified",
                    ));
                }
                key_code = Some(parse_key_code(key).ok_or_else(|| {
                    ClickerError::invalid_hotkey(hotkey_str, format!("unsupported key '{}'", key))
                })?);
            }
        }
    }

    let code = key_code
        .ok_or_else(|| ClickerError::invalid_hotkey(hotkey_str, "no key specified"))?;
    let modifiers = (!modifiers.is_empty()).then_some(modifiers);

    Ok(HotKey::new(modifiers, code))
}

/// Keys a chord may end in. Letters and function keys cover the usual
/// bindings; the rest are the keys commonly used for panic stops.
#[rustfmt::skip]
const KEYS: &[(&str, Code)] = &[
    ("a", Code::KeyA), ("b", Code::KeyB), ("c", Code::KeyC), ("d", Code::KeyD),
    ("e", Code::KeyE), ("f", Code::KeyF), ("g", Code::KeyG), ("h", Code::KeyH),
    ("i", Code::KeyI), ("j", Code::KeyJ), ("k", Code::KeyK), ("l", Code::KeyL),
    ("m", Code::KeyM), ("n", Code::KeyN), ("o", Code::KeyO), ("p", Code::KeyP),
    ("q", Code::KeyQ), ("r", Code::KeyR), ("s", Code::KeyS), ("t", Code::KeyT),
    ("u", Code::KeyU), ("v", Code::KeyV), ("w", Code::KeyW), ("x", Code::KeyX),
    ("y", Code::KeyY), ("z", Code::KeyZ),
    ("f1", Code::F1), ("f2", Code::F2), ("f3", Code::F3), ("f4", Code::F4),
    ("f5", Code::F5), ("f6", Code::F6), ("f7", Code::F7), ("f8", Code::F8),
    ("f9", Code::F9), ("f10", Code::F10), ("f11", Code::F11), ("f12", Code::F12),
    ("escape", Code::Escape),
    ("pause", Code::Pause),
    ("space", Code::Space),
    ("insert", Code::Insert),
    ("delete", Code::Delete),
    ("home", Code::Home),
    ("end", Code::End),
];

fn parse_key_code(key: &str) -> Option<Code> {
    let key = match key {
        "esc" => "escape",
        "del" => "delete",
        "ins" => "insert",
        other => other,
    };
    KEYS.iter().find(|(name, _)| *name == key).map(|(_, code)| *code)
}
