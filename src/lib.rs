// Re-export all public modules so they can be used from main.rs
pub mod config;
pub mod logging;
pub mod utils;
#[cfg(not(target_arch = "wasm32"))]
pub mod ui;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

#[cfg(target_arch = "wasm32")]
pub use web::start;

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use tracing::{error, info, warn};
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
    use web_sys::{Document, Event, HtmlCanvasElement, KeyboardEvent, Window};

    use crate::config::FlightConfig;
    use crate::controller::input::wasm::keyboard_event_to_input;
    use crate::controller::{FrameScheduler, InputEvent, InputState, SimulationLoop};
    use crate::logging;
    use crate::view::{GpuContext, ShapeRenderer};

    type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

    /// Schedules the loop through `requestAnimationFrame`.
    struct RafScheduler {
        window: Window,
        callback: FrameCallback,
    }

    impl FrameScheduler for RafScheduler {
        fn request_frame(&mut self) {
            let callback = self.callback.borrow();
            let Some(cb) = callback.as_ref() else {
                warn!("frame requested before the callback was installed");
                return;
            };
            if let Err(e) = self.window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                error!(error = ?e, "requestAnimationFrame failed");
            }
        }
    }

    #[wasm_bindgen(start)]
    pub async fn start() -> Result<(), JsValue> {
        logging::init();

        let config = FlightConfig::default();
        let arena = config.arena;
        let (window, document, canvas) = init_canvas(arena.width, arena.height)?;

        let gpu = GpuContext::new(&canvas, arena.width, arena.height)
            .await
            .map_err(|e| {
                error!(error = %e, "GPU init failed");
                js_error(format!("GPU init failed: {e}"))
            })?;
        let renderer = ShapeRenderer::new(gpu, &arena);

        let input = Rc::new(RefCell::new(InputState::new()));
        setup_input_listeners(&document, &window, input.clone())?;

        let callback: FrameCallback = Rc::new(RefCell::new(None));
        let scheduler = RafScheduler { window: window.clone(), callback: callback.clone() };
        let sim = Rc::new(RefCell::new(SimulationLoop::new(config, input, renderer, scheduler)));

        {
            let sim = sim.clone();
            // RAF timestamps are milliseconds
            *callback.borrow_mut() = Some(Closure::wrap(Box::new(move |timestamp: f64| {
                if let Err(e) = sim.borrow_mut().frame(timestamp / 1000.0) {
                    error!(error = %e, "simulation loop halted");
                }
            }) as Box<dyn FnMut(f64)>));
        }

        sim.borrow_mut()
            .start()
            .map_err(|e| js_error(format!("failed to start simulation: {e}")))?;
        info!("stardrift running in the browser");

        // The closure lives for the page's lifetime
        std::mem::forget(callback);
        Ok(())
    }

    fn setup_input_listeners(
        document: &Document,
        window: &Window,
        input: Rc<RefCell<InputState>>,
    ) -> Result<(), JsValue> {
        for (name, is_down) in [("keydown", true), ("keyup", false)] {
            let input = input.clone();
            let listener = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                let event = keyboard_event_to_input(&e, is_down);
                if input.borrow_mut().process_event(&event) {
                    e.prevent_default();
                }
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())?;
            listener.forget();
        }

        // Key-up never arrives once the page loses focus
        {
            let input = input.clone();
            let blur = Closure::wrap(Box::new(move |_e: Event| {
                input.borrow_mut().process_event(&InputEvent::FocusLost);
            }) as Box<dyn FnMut(Event)>);
            window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
            blur.forget();
        }

        {
            let doc = document.clone();
            let visibility = Closure::wrap(Box::new(move |_e: Event| {
                if doc.hidden() {
                    input.borrow_mut().process_event(&InputEvent::FocusLost);
                }
            }) as Box<dyn FnMut(Event)>);
            document.add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref())?;
            visibility.forget();
        }

        Ok(())
    }

    fn init_canvas(width: u32, height: u32) -> Result<(Window, Document, HtmlCanvasElement), JsValue> {
        let window = web_sys::window().ok_or_else(|| js_error("no global `window`"))?;
        let document = window.document().ok_or_else(|| js_error("no document on window"))?;
        let body = document.body().ok_or_else(|| js_error("no body on document"))?;
        let canvas = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| js_error("failed to create canvas"))?;
        canvas.set_width(width);
        canvas.set_height(height);
        body.append_child(&canvas)?;
        Ok((window, document, canvas))
    }

    fn js_error<E: Into<String>>(msg: E) -> JsValue {
        JsValue::from_str(&msg.into())
    }
}
