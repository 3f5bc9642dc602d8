//! Mirror used when none is configured

use async_trait::async_trait;

use crate::{Mirror, MirrorError, MirrorResult, MirrorRow};

/// Accepts nothing and has no viewing URL
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMirror;

#[async_trait]
impl Mirror for DisabledMirror {
    async fn ensure_header(&self) -> MirrorResult<()> {
        Ok(())
    }

    async fn append_row(&self, _row: &MirrorRow) -> MirrorResult<()> {
        Err(MirrorError::Disabled)
    }

    fn view_url(&self) -> Option<String> {
        None
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
