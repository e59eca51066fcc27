mod js;
mod logging;
mod utils;

#[cfg(feature = "web_sys_unstable_apis")]
mod capture;
#[cfg(feature = "web_sys_unstable_apis")]
mod codecs;
#[cfg(feature = "web_sys_unstable_apis")]
mod form;
#[cfg(feature = "web_sys_unstable_apis")]
mod page;
#[cfg(feature = "web_sys_unstable_apis")]
mod render;

use codec_loopback::{EncoderConfig, LoopbackSettings, MediaConstraints};
use wasm_bindgen::prelude::*;

#[cfg(feature = "web_sys_unstable_apis")]
pub use page::LoopbackPage;

#[wasm_bindgen]
extern "C" {
    fn alert(s: &str);

    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

// Call `utils::set_panic_hook` automatically
#[wasm_bindgen(start)]
fn main() {
    utils::set_panic_hook();
}

#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(level: &str) {
    logging::init_logging(level);
}

/// Encoder configuration the page would use for a settings object.
#[wasm_bindgen(js_name = encoderConfigFor)]
pub fn encoder_config_for(settings: JsValue) -> Result<JsValue, JsValue> {
    let settings = settings_from_js(settings)?;
    js::to_js_value(&EncoderConfig::from_settings(&settings)).map_err(js::to_js_error)
}

/// `getUserMedia` constraints the page would use for a settings object.
#[wasm_bindgen(js_name = constraintsFor)]
pub fn constraints_for(settings: JsValue) -> Result<JsValue, JsValue> {
    let settings = settings_from_js(settings)?;
    js::to_js_value(&MediaConstraints::from_settings(&settings)).map_err(js::to_js_error)
}

pub(crate) fn settings_from_js(value: JsValue) -> Result<LoopbackSettings, JsValue> {
    let settings: LoopbackSettings = if value.is_undefined() || value.is_null() {
        LoopbackSettings::default()
    } else {
        serde_wasm_bindgen::from_value(value).map_err(js::to_js_error)?
    };
    settings.validate().map_err(js::to_js_error)?;
    Ok(settings)
}
