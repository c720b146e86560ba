//! Shared editor handle
//!
//! Wraps the session in `Arc<Mutex<..>>` so a UI layer can drive it from
//! async command handlers. Image decoding runs on a blocking worker while
//! the session is marked as loading and the lock is released.

use parking_lot::Mutex;
use std::sync::Arc;

use super::CanvasSession;
use crate::config::EditorConfig;
use crate::core::Result;
use crate::ingest::{self, ImageSource, LoadOptions};
use crate::store::{InputSink, SessionStore};

#[derive(Debug, Clone)]
pub struct Editor {
    session: Arc<Mutex<CanvasSession>>,
}

impl Editor {
    pub fn new(
        config: EditorConfig,
        store: Arc<dyn SessionStore>,
        sink: Arc<dyn InputSink>,
    ) -> Self {
        Self::from_session(CanvasSession::new(config, store, sink))
    }

    pub fn from_session(session: CanvasSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` with the session locked
    pub fn with_session<T>(&self, f: impl FnOnce(&mut CanvasSession) -> T) -> T {
        let mut session = self.session.lock();
        f(&mut session)
    }

    /// Decode `source` off the session lock, then install it.
    ///
    /// Pointer input and commits are ignored until the image is in place.
    pub async fn load_image(&self, source: ImageSource, options: LoadOptions) -> Result<()> {
        let config = {
            let mut session = self.session.lock();
            if !session.is_mounted() {
                tracing::debug!("Ignoring image load on unmounted session");
                return Ok(());
            }
            session.begin_loading();
            session.config().clone()
        };

        let decoded =
            tokio::task::spawn_blocking(move || ingest::decode_source(source, options, &config))
                .await;

        let mut session = self.session.lock();
        session.finish_loading();
        let decoded = decoded??;
        session.install_image(decoded, options.preserve_layers);
        Ok(())
    }

    /// Open the editor and pick up where the stored session left off.
    ///
    /// A saved canvas wins over a pending hand-off image; with neither, the
    /// canvas starts blank at the default size. A saved canvas is only
    /// restored together with the image it was drawn on.
    pub async fn mount(&self) -> Result<()> {
        let state = {
            let mut session = self.session.lock();
            session.clear_history();
            session.store().load()
        };

        let saved = match (state.canvas_state, state.last_image_string) {
            (Some(canvas), Some(image)) => Some((canvas, image)),
            (Some(_), None) => {
                tracing::warn!("Discarding saved canvas without a stored image");
                if let Err(err) = self.with_session(|s| s.store()).clear_canvas() {
                    tracing::warn!("Failed to clear stored canvas: {}", err);
                }
                None
            }
            (None, _) => None,
        };

        if let Some((canvas, image)) = saved {
            self.with_session(|s| s.restore(canvas, state.mask_layer_state));
            self.load_image(
                ImageSource::Encoded(image),
                LoadOptions {
                    already_decoded: true,
                    preserve_layers: true,
                },
            )
            .await?;
        } else if let Some(source) = state.i2i_source {
            self.with_session(|s| s.init_canvas(source.height, source.width));
            self.load_image(
                ImageSource::Encoded(source.base64_string),
                LoadOptions {
                    already_decoded: true,
                    preserve_layers: false,
                },
            )
            .await?;
        } else {
            self.with_session(|s| {
                let (height, width) = (s.config().default_height, s.config().default_width);
                s.init_canvas(height, width);
            });
        }

        tracing::info!("Editor mounted");
        Ok(())
    }

    /// Release the surface and all layers
    pub fn unmount(&self) {
        self.session.lock().unmount();
    }
}
