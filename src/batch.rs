//! Parallel sheet generation for many files.
//!
//! Each file gets its own [`MediaFile`](crate::MediaFile), acceptor and
//! canvas on a rayon worker; only the text renderer's font database and the
//! run options are shared. Results come back in input order.

use std::path::{Path, PathBuf};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::{
    configuration::{LayoutSpec, RunOptions},
    error::SheetError,
    sheet::{SheetSummary, generate_with_renderer},
    text::SvgTextRenderer,
};

/// Generate one sheet per input in parallel.
///
/// A failure for one file does not stop the others; each input gets its own
/// result. Cancelling the token in `options` makes every file not yet
/// finished return [`SheetError::Cancelled`].
///
/// # Example
///
/// ```no_run
/// use thumbsheet::{LayoutSpec, RunOptions};
///
/// let inputs = ["a.mp4", "b.mkv"];
/// for (path, result) in thumbsheet::generate_many(&inputs, &LayoutSpec::default(), &RunOptions::new()) {
///     match result {
///         Ok(summary) => println!("{}: {} shots", path.display(), summary.accepted_count),
///         Err(error) => eprintln!("{}: {error}", path.display()),
///     }
/// }
/// ```
pub fn generate_many<P>(
    inputs: &[P],
    spec: &LayoutSpec,
    options: &RunOptions,
) -> Vec<(PathBuf, Result<SheetSummary, SheetError>)>
where
    P: AsRef<Path> + Sync,
{
    let renderer = SvgTextRenderer::new();

    log::info!("Generating {} sheets in parallel", inputs.len());

    inputs
        .par_iter()
        .map(|input| {
            let path = input.as_ref().to_path_buf();
            let result = if options.is_cancelled() {
                Err(SheetError::Cancelled)
            } else {
                generate_with_renderer(&path, spec, &renderer, options)
            };
            if let Err(error) = &result {
                log::warn!("Sheet for {} failed: {error}", path.display());
            }
            (path, result)
        })
        .collect()
}
