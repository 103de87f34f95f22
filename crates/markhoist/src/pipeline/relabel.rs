//! Relabel stage: render the replacement mark text
//!
//! Every reference with a rewrite target gets its new mark rendered here,
//! honoring the configured anchor wrap. Write-back consumes the rendered text
//! verbatim; references without a target (failed, skipped, or untouched) get
//! none and are left alone downstream.

use async_trait::async_trait;

use super::context::MarkWrap;
use super::{Handler, PipelineContext, Signal};

pub struct RelabelHandler;

#[async_trait]
impl Handler for RelabelHandler {
    fn name(&self) -> &'static str {
        "relabel"
    }

    async fn handle(&self, ctx: &mut PipelineContext) -> Signal {
        let wrap = ctx.options.wrap;
        for group in &mut ctx.groups {
            for r in &mut group.refs {
                if let Some(target) = &r.uploaded_url {
                    r.rendered_mark = Some(render_mark(&r.title, target, wrap));
                }
            }
        }
        Signal::Continue
    }
}

/// Render the textual mark for `title` pointing at `target`.
pub fn render_mark(title: &str, target: &str, wrap: MarkWrap) -> String {
    let plain = format!("![{title}]({target})");
    match wrap {
        MarkWrap::None => plain,
        MarkWrap::Large => {
            format!("<a data-fancybox title='{title}' href='{target}'>{plain}</a>")
        }
        MarkWrap::Common => {
            format!("<a title='{title}' href='{target}' target='_blank'>{plain}</a>")
        }
    }
}
