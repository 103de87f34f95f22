//! Write-back stage: apply offset-based replacements to owning buffers
//!
//! All replacements for one buffer are planned first, then applied in a
//! single mutation pass in descending start order. Planning and applying
//! happen under that buffer's write gate, so two runs targeting the same
//! buffer identity cannot interleave their edits.

use async_trait::async_trait;
use tracing::debug;

use super::{Handler, PipelineContext, Signal};
use crate::buffer::{Replacement, apply_replacements};
use crate::error::HoistError;

pub struct WriteBackHandler;

#[async_trait]
impl Handler for WriteBackHandler {
    fn name(&self) -> &'static str {
        "write-back"
    }

    async fn handle(&self, ctx: &mut PipelineContext) -> Signal {
        for group_index in 0..ctx.groups.len() {
            let buffer_arc = ctx.groups[group_index].buffer.clone();

            let buffer_name = match buffer_arc.lock() {
                Ok(buffer) => buffer.name().to_string(),
                Err(_) => {
                    return Signal::Abort(HoistError::Task("buffer lock poisoned".to_string()));
                }
            };
            let gate = match ctx.write_gate.lock_for(&buffer_name) {
                Ok(gate) => gate,
                Err(err) => return Signal::Abort(err),
            };
            let _guard = gate.lock().await;

            let mut buffer = match buffer_arc.lock() {
                Ok(buffer) => buffer,
                Err(_) => {
                    return Signal::Abort(HoistError::Task("buffer lock poisoned".to_string()));
                }
            };

            let mut plan = Vec::new();
            for r in &ctx.groups[group_index].refs {
                let Some(new_text) = &r.rendered_mark else {
                    continue;
                };
                let line_start = buffer.line_start_offset(r.line_number);
                let line_end = buffer.line_end_offset(r.line_number);
                let line = buffer.text(line_start..line_end);
                // Offsets were recorded against the trimmed line.
                let lead = line.len() - line.trim_start().len();
                plan.push(Replacement {
                    image: r.resolved_image_name.clone(),
                    start: line_start + lead + r.mark_start,
                    end: line_start + lead + r.mark_end,
                    expected: r.original_mark.clone(),
                    text: new_text.clone(),
                });
            }

            let planned = plan.len();
            let (applied, conflicts) = apply_replacements(&mut *buffer, plan);
            drop(buffer);
            debug!(buffer = %buffer_name, planned, applied, "write-back");

            ctx.add_processed(applied);
            for conflict in conflicts {
                ctx.record_failure(conflict.image.clone(), conflict.reason);
            }
        }
        Signal::Continue
    }
}
