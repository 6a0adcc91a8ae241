use css_inline::{CSSInliner, InlineError};

/// Moves `<style>` rules onto the elements they match.
///
/// Class attributes stay in place and `!important` declarations win over
/// plain ones. Remote stylesheets are never fetched.
pub struct CssInliner {
    inner: CSSInliner<'static>,
}

impl CssInliner {
    pub fn new() -> Self {
        Self {
            inner: CSSInliner::options()
                .keep_style_tags(false)
                .keep_link_tags(true)
                .build(),
        }
    }

    pub fn inline(&self, html: &str) -> Result<String, InlineError> {
        self.inner.inline(html)
    }
}

impl Default for CssInliner {
    fn default() -> Self {
        Self::new()
    }
}
