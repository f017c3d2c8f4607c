use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use rand::{SeedableRng, rngs::StdRng};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
#[cfg(target_arch = "wasm32")]
use winit::event_loop::EventLoopProxy;
#[cfg(target_arch = "wasm32")]
use once_cell::sync::OnceCell;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen_futures::future_to_promise;
#[cfg(target_arch = "wasm32")]
use js_sys::Promise;

pub mod animator;
pub mod batch;
pub mod camera;
pub mod canvas;
pub mod config;
pub mod field;
pub mod host;
pub mod models;
mod app_state;
mod ui_events;

pub use config::FieldConfig;

use animator::Animator;
use app_state::State;
use field::NeuronField;
use host::{WindowHost, logical_extent};
use ui_events::UserCommand;

#[cfg(target_arch = "wasm32")]
const CANVAS_ID: &str = "canvas";
#[cfg(target_arch = "wasm32")]
const CONFIG_ATTRIBUTE: &str = "data-field-config";

#[cfg(target_arch = "wasm32")]
static WASM_API_INSTANCE: OnceCell<WasmApi> = OnceCell::new();

#[cfg(target_arch = "wasm32")]
static WASM_READY_FLUME_CHANNEL: OnceCell<(flume::Sender<()>, flume::Receiver<()>)> = OnceCell::new();

fn lock(state: &Mutex<Option<State>>) -> MutexGuard<'_, Option<State>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn field_rng(config: &FieldConfig) -> StdRng {
    match config.seed {
        Some(seed) => {
            log::info!("Seeding neuron field with {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    }
}

pub(crate) struct App {
    config: FieldConfig,
    window: Option<Arc<Window>>,
    state: Arc<Mutex<Option<State>>>, // Filled asynchronously on the web
    animator: Option<Animator>,
    host: WindowHost,
    #[cfg(target_arch = "wasm32")]
    proxy: Option<EventLoopProxy<UserCommand>>,
}

impl App {
    fn new(config: FieldConfig, #[cfg(target_arch = "wasm32")] event_loop: &EventLoop<UserCommand>) -> Self {
        #[cfg(target_arch = "wasm32")]
        let app_proxy = event_loop.create_proxy();

        #[cfg(target_arch = "wasm32")]
        {
            let wasm_api_instance = WasmApi { proxy: app_proxy.clone() };
            if WASM_API_INSTANCE.set(wasm_api_instance).is_err() {
                log::warn!("WASM_API_INSTANCE was already set. This should only happen once.");
            }
        }

        Self {
            config,
            window: None,
            state: Arc::new(Mutex::new(None)),
            animator: None,
            host: WindowHost::new(),
            #[cfg(target_arch = "wasm32")]
            proxy: Some(app_proxy),
        }
    }

    /// Seeds the field over the window's current logical size and starts the frame loop.
    fn mount(&mut self) {
        if self.animator.is_some() {
            log::warn!("Neuron field is already mounted");
            return;
        }
        let Some(window) = self.window.clone() else {
            log::warn!("Cannot mount the neuron field without a window");
            return;
        };

        let (width, height) = logical_extent(window.inner_size(), window.scale_factor());
        self.host.attach(window);
        let mut rng = field_rng(&self.config);
        let field = NeuronField::seeded(self.config.clone(), width, height, &mut rng);
        self.animator = Some(Animator::mount(field, &mut self.host));
    }

    /// Reconfigures the GPU surface. `size` is in physical pixels.
    fn resize_surface(&mut self, size: PhysicalSize<u32>) {
        if let Some(state) = lock(&self.state).as_mut() {
            state.resize(size.width, size.height);
        }
    }

    /// Rescales the field bounds. `width` and `height` are logical (CSS) pixels.
    fn resize_field(&mut self, width: u32, height: u32) {
        if !self.host.is_listening_for_resize() {
            return;
        }
        if let Some(animator) = self.animator.as_mut() {
            animator.resize(width, height);
        }
    }

    fn teardown(&mut self) {
        match self.animator.as_mut() {
            Some(animator) => animator.teardown(&mut self.host),
            None => log::warn!("Teardown requested before the neuron field was mounted"),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        // Redraws the field did not ask for (exposure, OS repaint) do not step it.
        if self.host.take_armed_frame().is_none() {
            return;
        }
        let Some(animator) = self.animator.as_mut() else {
            return;
        };
        let mut guard = lock(&self.state);
        let Some(state) = guard.as_mut() else {
            log::warn!("Frame requested before State was initialized, ignoring.");
            return;
        };

        animator.frame(state.begin_frame(), &mut self.host);

        match state.render() {
            Ok(_) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                state.resize(state.config.width, state.config.height)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory, exiting.");
                event_loop.exit();
            }
            Err(e) => log::error!("{:?}", e),
        }
    }
}

impl ApplicationHandler<UserCommand> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes()
            .with_title("Neuron Field");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = wgpu::web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID));
            let Some(canvas) = canvas else {
                log::error!("No #{} element to draw on.", CANVAS_ID);
                return;
            };
            window_attributes = window_attributes.with_canvas(Some(canvas.unchecked_into()));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        let background = self.config.palette.background();
        let expected_circles = self.config.node_count;
        let expected_lines = self.config.node_count * self.config.max_neighbors;

        #[cfg(not(target_arch = "wasm32"))]
        {
            match pollster::block_on(State::new(window, background, expected_circles, expected_lines)) {
                Ok(state) => {
                    lock(&self.state).replace(state);
                    self.mount();
                }
                Err(e) => {
                    log::error!("Failed to create State: {:#}", e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let state_arc_for_spawn = self.state.clone();
            let Some(proxy_for_init_notification) = self.proxy.clone() else {
                log::error!("App proxy not set");
                return;
            };

            wasm_bindgen_futures::spawn_local(async move {
                match State::new(window, background, expected_circles, expected_lines).await {
                    Ok(state_instance) => {
                        lock(&state_arc_for_spawn).replace(state_instance);
                        log::info!("WASM State assigned to App. Sending initialization notification.");
                        if proxy_for_init_notification.send_event(UserCommand::StateInitialized).is_err() {
                            log::error!("Failed to send StateInitialized event.");
                        }
                    }
                    Err(e) => log::error!("Failed to create State in WASM: {:#}", e),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserCommand) {
        self.process_command(event);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.teardown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.resize_surface(size);
                let scale_factor = self.window.as_ref().map_or(1.0, |window| window.scale_factor());
                let (width, height) = logical_extent(size, scale_factor);
                self.resize_field(width, height);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                // A `Resized` with the new physical size follows.
                if let Some(state) = lock(&self.state).as_mut() {
                    state.set_scale_factor(scale_factor);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

/// Installs the logger for the current platform: `env_logger` natively
/// (`RUST_LOG`, default `info`), the browser console on the web.
pub fn init_logging() -> anyhow::Result<()> {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            console_error_panic_hook::set_once();
            console_log::init_with_level(log::Level::Info)?;
        } else {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .try_init()?;
        }
    }
    Ok(())
}

/// Opens the window (or binds the page canvas) and animates until closed.
pub fn run(config: FieldConfig) -> anyhow::Result<()> {
    config.validate()?;

    #[cfg(target_arch = "wasm32")]
    {
        log::info!("Starting neuron field.");
        if WASM_READY_FLUME_CHANNEL.set(flume::unbounded()).is_err() {
            log::warn!("WASM ready channel was already created.");
        }
    }

    let event_loop = EventLoop::with_user_event().build()?;
    let mut app = App::new(
        config,
        #[cfg(target_arch = "wasm32")]
        &event_loop,
    );
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn signal_wasm_ready() {
    if let Some((sender, _)) = WASM_READY_FLUME_CHANNEL.get() {
        if let Err(e) = sender.send(()) {
            log::error!("Failed to send WASM ready signal: {:?}", e);
        }
    }
}

/// Reads the optional JSON config from the canvas' `data-field-config` attribute.
#[cfg(target_arch = "wasm32")]
fn web_config() -> FieldConfig {
    let attribute = web_sys::window()
        .and_then(|window| window.document())
        .and_then(|document| document.get_element_by_id(CANVAS_ID))
        .and_then(|canvas| canvas.get_attribute(CONFIG_ATTRIBUTE));

    match attribute.as_deref().map(FieldConfig::from_json) {
        None => FieldConfig::default(),
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            log::warn!("Ignoring invalid {}: {:#}", CONFIG_ATTRIBUTE, e);
            FieldConfig::default()
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), JsValue> {
    init_logging().map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;
    run(web_config()).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}

/// Handle the page uses to forward surface lifecycle events.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
#[derive(Clone, Debug)]
pub struct WasmApi {
    proxy: EventLoopProxy<UserCommand>,
}

#[cfg(target_arch = "wasm32")]
impl WasmApi {
    fn send(&self, command: UserCommand) -> Result<(), JsValue> {
        self.proxy
            .send_event(command)
            .map_err(|_| JsValue::from_str("Failed to send command to event loop."))
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl WasmApi {
    /// Tells the field the canvas now measures `width` x `height` CSS pixels.
    /// The GPU surface follows the canvas' own resize events, not this call.
    #[wasm_bindgen(js_name = resize)]
    pub fn resize(&self, width: u32, height: u32) -> Result<(), JsValue> {
        self.send(UserCommand::Resize { width, height })
    }

    /// Stops the animation. Call once, when the canvas is being removed.
    #[wasm_bindgen(js_name = teardown)]
    pub fn teardown(&self) -> Result<(), JsValue> {
        log::info!("Received teardown from JS.");
        self.send(UserCommand::Teardown)
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = getWasmApi)]
pub fn get_wasm_api() -> Result<WasmApi, JsValue> {
    WASM_API_INSTANCE.get()
        .cloned()
        .ok_or_else(|| JsValue::from_str("WasmApi is not initialized. Call run_web() first."))
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = getWasmReadyPromise)]
pub fn get_wasm_ready_promise() -> Result<Promise, JsValue> {
    let (_, receiver) = WASM_READY_FLUME_CHANNEL.get()
        .ok_or_else(|| JsValue::from_str("WASM ready channel not initialized. Call run_web() first."))?;
    let receiver = receiver.clone();

    Ok(future_to_promise(async move {
        receiver
            .recv_async()
            .await
            .map_err(|e| JsValue::from_str(&format!("WASM ready channel closed: {}", e)))?;
        Ok(JsValue::NULL)
    }))
}
