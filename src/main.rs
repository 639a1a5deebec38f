//! Entry point for the **linebar** status label.
//!
//! Usage: `linebar [PORT] [--headless]`
//!
//! Starts the line server on a background thread and shows the latest
//! received line.  When the `display-gtk` feature is enabled the main
//! thread runs the GLib main loop and the label lives in a layer-shell
//! window; with `--headless` (or without the feature) lines are printed to
//! stdout instead.

use linebar::bridge::AppContext;
use linebar::config::{config_dir, port_from_arg, Config};
use linebar::display::stdout::{run_headless, StdoutDisplay};
use log::{error, info, warn};

/// Try to load the config from `$XDG_CONFIG_HOME/linebar/config.json`,
/// falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = config_dir().join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

/// Resolve the CSS stylesheet path.
#[cfg(feature = "display-gtk")]
fn css_path() -> std::path::PathBuf {
    config_dir().join("style.css")
}

//  Main

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let headless = args.iter().any(|a| a == "--headless");
    let port_arg = args.iter().find(|a| !a.starts_with("--")).map(String::as_str);

    let mut config = load_config();
    match port_from_arg(port_arg) {
        Some(port) => config.server.port = port,
        None => {
            if let Some(arg) = port_arg {
                warn!("ignoring port argument {:?}, using {}", arg, config.server.port);
            }
        }
    }

    let mut ctx = AppContext::new(config.server.clone());
    if let Err(e) = ctx.start() {
        error!("cannot start: {}", e);
        std::process::exit(1);
    }

    if headless {
        run_headless(&mut ctx, &mut StdoutDisplay::new());
    } else {
        start_display(ctx, config);
    }
}

//  Display loops

#[cfg(feature = "display-gtk")]
fn start_display(ctx: AppContext, config: Config) {
    linebar::display::gtk::run_main_loop(ctx, config.display, Some(css_path()));
}

#[cfg(not(feature = "display-gtk"))]
fn start_display(mut ctx: AppContext, _config: Config) {
    info!("built without `display-gtk`, printing lines to stdout");
    run_headless(&mut ctx, &mut StdoutDisplay::new());
}
