//! GTK4 + layer-shell status label that runs on the **main thread**.
//!
//! # Widget tree
//!
//! ```text
//! window                 (layer-shell, anchored top-right, transparent)
//! └ .line-bar          (rounded box, right click opens the menu)
//!     ├ .line-label    (the latest line)
//!     └ popover        ("Quit" button)
//! ```
//!
//! # CSS selectors
//!
//! | Selector      | Targets                                  |
//! |---------------|------------------------------------------|
//! | `window`      | The bar window (keep transparent)        |
//! | `.line-bar`   | Container around the label               |
//! | `.line-label` | The label showing the latest line        |
//!
//! Font family and size come from [`DisplayConfig`]; a user stylesheet
//! replaces the built-in one entirely.

use crate::bridge::{AppContext, Lifecycle};
use crate::config::DisplayConfig;
use crate::traits::StatusDisplay;
use gtk4::prelude::*;
use gtk4::{gdk, glib};
use gtk4_layer_shell::{Edge, KeyboardMode, Layer, LayerShell};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

//  Default CSS

fn default_css(config: &DisplayConfig) -> String {
    format!(
        r#"
window,
window.background {{
    background-color: transparent;
    background: none;
}}

.line-bar {{
    background-color: rgba(0, 0, 0, 0.75);
    border-radius: 6px;
    padding: 2px 8px;
}}

.line-label {{
    font-family: "{}";
    font-size: {}pt;
    color: white;
}}
"#,
        config.font_family, config.font_size
    )
}

//  Label display

struct LabelDisplay {
    label: gtk4::Label,
}

impl StatusDisplay for LabelDisplay {
    fn set_text(&mut self, text: &str) {
        self.label.set_text(text);
    }
}

//  Public API

/// Run the GTK4 main loop on the **current** (main) thread until the user
/// picks "Quit" from the label's menu.
///
/// `ctx` must already be running; this function only drains it.
pub fn run_main_loop(ctx: AppContext, config: DisplayConfig, css_path: Option<PathBuf>) {
    gtk4::init().expect("failed to initialise GTK4");
    info!("GTK4 initialised on main thread");

    load_css(&css_path, &config);

    //  Layer-shell bar window
    let window = gtk4::Window::new();
    window.init_layer_shell();
    window.set_layer(Layer::Top);
    window.set_namespace("linebar");
    window.set_keyboard_mode(KeyboardMode::OnDemand);
    window.set_anchor(Edge::Top, true);
    window.set_anchor(Edge::Right, true);
    window.set_decorated(false);
    window.remove_css_class("background");

    let container = gtk4::Box::new(gtk4::Orientation::Horizontal, 0);
    container.add_css_class("line-bar");
    window.set_child(Some(&container));

    let label = gtk4::Label::new(None);
    label.add_css_class("line-label");
    label.set_single_line_mode(true);
    label.set_tooltip_text(Some(&config.tooltip));
    container.append(&label);

    let main_loop = glib::MainLoop::new(None, false);
    let ctx = Rc::new(RefCell::new(ctx));

    //  Quit menu
    let quit = gtk4::Button::with_label("Quit linebar");
    let popover = gtk4::Popover::new();
    popover.set_child(Some(&quit));
    popover.set_parent(&container);
    {
        let ctx = Rc::clone(&ctx);
        let main_loop = main_loop.clone();
        let popover = popover.clone();
        quit.connect_clicked(move |_| {
            info!("quit requested from menu");
            popover.popdown();
            ctx.borrow_mut().terminate();
            main_loop.quit();
        });
    }

    let click = gtk4::GestureClick::new();
    click.set_button(gdk::BUTTON_SECONDARY);
    {
        let popover = popover.clone();
        click.connect_pressed(move |_, _, _, _| {
            debug!("menu opened");
            popover.popup();
        });
    }
    container.add_controller(click);

    window.present();
    info!(
        "status label ready (lines on {}, font {} {}pt, poll {}ms, CSS: {})",
        ctx.borrow()
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "<not started>".into()),
        config.font_family,
        config.font_size,
        config.poll_ms,
        css_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<built-in>".into()),
    );

    //  Drain loop
    let mut display = LabelDisplay { label };
    {
        let ctx = Rc::clone(&ctx);
        let main_loop = main_loop.clone();
        glib::timeout_add_local(Duration::from_millis(config.poll_ms.max(1)), move || {
            let mut ctx = ctx.borrow_mut();
            if ctx.state() != Lifecycle::Running {
                main_loop.quit();
                return glib::ControlFlow::Break;
            }
            ctx.refresh(&mut display);
            glib::ControlFlow::Continue
        });
    }

    info!("entering GLib main loop");
    main_loop.run();
    popover.unparent();
    info!("GLib main loop exited");
}

//  CSS loading

fn load_css(css_path: &Option<PathBuf>, config: &DisplayConfig) {
    let provider = gtk4::CssProvider::new();

    let css_content = match css_path.as_ref().filter(|p| p.exists()) {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(content) => {
                info!("user CSS: {} ({} bytes)", p.display(), content.len());
                content
            }
            Err(e) => {
                warn!("CSS read failed ({}): {}, using built-in", p.display(), e);
                default_css(config)
            }
        },
        None => {
            info!("no user CSS, using built-in default");
            default_css(config)
        }
    };

    #[allow(deprecated)]
    provider.load_from_data(&css_content);

    if let Some(display) = gdk::Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
        info!("CSS registered on display");
    } else {
        warn!("no GDK display, CSS will not be applied");
    }
}
