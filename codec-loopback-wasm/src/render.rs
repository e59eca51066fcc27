use anyhow::{Result, anyhow};
use js_sys::{Function, Promise};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, ImageBitmap, VideoFrame, Window};

use crate::js::{error_message, js_error};

/// `window.createImageBitmap(source)` for any image source, including
/// `VideoFrame`.
pub fn create_image_bitmap(window: &Window, source: &JsValue) -> Result<Promise> {
    let function: Function = js_sys::Reflect::get(window, &JsValue::from_str("createImageBitmap"))
        .map_err(js_error)?
        .dyn_into()
        .map_err(|_| anyhow!("createImageBitmap is not available"))?;
    function
        .call1(window, source)
        .map_err(js_error)?
        .dyn_into()
        .map_err(|_| anyhow!("createImageBitmap did not return a promise"))
}

fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d> {
    canvas
        .get_context("2d")
        .map_err(js_error)?
        .ok_or_else(|| anyhow!("Canvas has no 2d context"))?
        .dyn_into()
        .map_err(|_| anyhow!("Unexpected 2d context type"))
}

/// Resizes `canvas` to the frame and draws it once its bitmap is ready.
/// The frame itself may be closed as soon as this returns.
pub fn draw_frame(window: &Window, canvas: &HtmlCanvasElement, frame: &VideoFrame) -> Result<()> {
    canvas.set_width(frame.display_width());
    canvas.set_height(frame.display_height());
    let context = context_2d(canvas)?;

    let bitmap = create_image_bitmap(window, frame)?;
    wasm_bindgen_futures::spawn_local(async move {
        match JsFuture::from(bitmap).await {
            Ok(bitmap) => {
                let bitmap: ImageBitmap = bitmap.unchecked_into();
                if let Err(e) = context.draw_image_with_image_bitmap(&bitmap, 0.0, 0.0) {
                    tracing::warn!("drawImage failed: {}", error_message(&e));
                }
                bitmap.close();
            }
            Err(e) => tracing::warn!("createImageBitmap failed: {}", error_message(&e)),
        }
    });
    Ok(())
}

/// Drops the canvas contents by resetting its backing store.
pub fn clear_canvas(canvas: &HtmlCanvasElement) {
    canvas.set_height(canvas.height());
}
