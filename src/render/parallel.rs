//! Rendering many pages at once.
//!
//! Chunked mode hands each worker a serialized copy of its contiguous slice
//! of pages; threaded mode renders every page on its own surface over the
//! shared layout. Output order always follows page order. Any failure throws
//! away the parallel output and renders everything sequentially.

use std::any::Any;
use std::ops::Range;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use rayon::prelude::*;

use crate::canvas::SurfaceFactory;
use crate::config::ParallelMode;
use crate::error::ParallelRenderError;
use crate::interchange::LayoutSnapshot;
use crate::layout::Page;

use super::{Diagnostics, PageRenderer};

pub struct RenderOutput<P> {
    pub pages: Vec<P>,
    pub diagnostics: Diagnostics,
    /// Mode that produced `pages`; `Sequential` after a fallback.
    pub mode: ParallelMode,
}

type ChunkResult<P> = Result<(Vec<P>, Diagnostics), ParallelRenderError>;

pub struct PageCompiler<'a> {
    renderer: PageRenderer<'a>,
    mode: ParallelMode,
}

/// Contiguous ranges covering `0..len`, `parts` of them at most, sizes differing by at most one.
pub fn chunk_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, len.max(1));
    let base = len / parts;
    let rem = len % parts;
    let mut start = 0;
    (0..parts)
        .map(|i| {
            let size = base + usize::from(i < rem);
            let range = start..start + size;
            start += size;
            range
        })
        .filter(|r| !r.is_empty())
        .collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn build_pool(workers: usize, prefix: &'static str) -> Result<rayon::ThreadPool, ParallelRenderError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(move |i| format!("{prefix}-{i}"))
        .build()
        .map_err(|e| ParallelRenderError::Pool(e.to_string()))
}

impl<'a> PageCompiler<'a> {
    pub fn new(renderer: PageRenderer<'a>, mode: ParallelMode) -> Self {
        Self { renderer, mode }
    }

    pub fn compile<F: SurfaceFactory>(&self, pages: &[Page], factory: &F) -> RenderOutput<F::Page> {
        let t0 = Instant::now();
        let result = match self.mode {
            ParallelMode::Sequential => Ok(self.sequential(pages, factory)),
            ParallelMode::Chunked { .. } => self.chunked(pages, factory, self.mode.workers()),
            ParallelMode::Threaded { .. } => self.threaded(pages, factory, self.mode.workers()),
        };
        let output = match result {
            Ok(output) => output,
            Err(err) => {
                log::warn!("{err}; re-rendering {} pages sequentially", pages.len());
                self.sequential(pages, factory)
            }
        };
        log::info!(
            "Rendered {} pages ({:?}) in {:.1}ms",
            output.pages.len(),
            output.mode,
            t0.elapsed().as_secs_f64() * 1000.0
        );
        output
    }

    pub fn sequential<F: SurfaceFactory>(&self, pages: &[Page], factory: &F) -> RenderOutput<F::Page> {
        let mut surface = factory.create();
        let diagnostics = self.renderer.render_pages(pages, &mut surface);
        RenderOutput {
            pages: factory.finish(surface),
            diagnostics,
            mode: ParallelMode::Sequential,
        }
    }

    fn chunked<F: SurfaceFactory>(
        &self,
        pages: &[Page],
        factory: &F,
        workers: usize,
    ) -> Result<RenderOutput<F::Page>, ParallelRenderError> {
        let ranges = chunk_ranges(pages.len(), workers);
        let payloads = ranges
            .iter()
            .enumerate()
            .map(|(chunk, range)| {
                LayoutSnapshot::export(&pages[range.clone()])
                    .to_json()
                    .map_err(|e| ParallelRenderError::Transfer {
                        chunk,
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<String>, _>>()?;
        log::debug!("chunked render: {} chunks over {} workers", payloads.len(), workers);

        let pool = build_pool(ranges.len().max(1), "typeset-chunk")?;
        let results: Vec<ChunkResult<F::Page>> = pool.install(|| {
            payloads
                .par_iter()
                .enumerate()
                .map(|(chunk, payload)| self.render_chunk(chunk, payload, factory))
                .collect()
        });
        self.merge(results, pages.len(), ParallelMode::Chunked { workers })
    }

    /// Runs on a worker: decode the private copy, render it on a fresh surface.
    fn render_chunk<F: SurfaceFactory>(&self, chunk: usize, payload: &str, factory: &F) -> ChunkResult<F::Page> {
        catch_unwind(AssertUnwindSafe(|| {
            let transfer = |e: crate::error::Error| ParallelRenderError::Transfer {
                chunk,
                reason: e.to_string(),
            };
            let pages = LayoutSnapshot::from_json(payload).and_then(|s| s.import()).map_err(transfer)?;
            let mut surface = factory.create();
            let diagnostics = self.renderer.render_pages(&pages, &mut surface);
            Ok((factory.finish(surface), diagnostics))
        }))
        .unwrap_or_else(|payload| {
            Err(ParallelRenderError::WorkerPanic {
                chunk,
                reason: panic_message(payload),
            })
        })
    }

    fn threaded<F: SurfaceFactory>(
        &self,
        pages: &[Page],
        factory: &F,
        workers: usize,
    ) -> Result<RenderOutput<F::Page>, ParallelRenderError> {
        let pool = build_pool(workers, "typeset-page")?;
        let results: Vec<ChunkResult<F::Page>> = pool.install(|| {
            pages
                .par_iter()
                .enumerate()
                .map(|(index, page)| {
                    catch_unwind(AssertUnwindSafe(|| {
                        let mut surface = factory.create();
                        let mut diagnostics = Diagnostics::default();
                        self.renderer.render_page(page, &mut surface, &mut diagnostics);
                        (factory.finish(surface), diagnostics)
                    }))
                    .map_err(|payload| ParallelRenderError::WorkerPanic {
                        chunk: index,
                        reason: panic_message(payload),
                    })
                })
                .collect()
        });
        self.merge(results, pages.len(), ParallelMode::Threaded { workers })
    }

    /// Concatenate per-chunk output in index order; all or nothing.
    fn merge<P>(
        &self,
        results: Vec<ChunkResult<P>>,
        expected: usize,
        mode: ParallelMode,
    ) -> Result<RenderOutput<P>, ParallelRenderError> {
        let mut pages = Vec::with_capacity(expected);
        let mut diagnostics = Diagnostics::default();
        for result in results {
            let (chunk_pages, chunk_diagnostics) = result?;
            pages.extend(chunk_pages);
            diagnostics.extend(chunk_diagnostics);
        }
        if pages.len() != expected {
            return Err(ParallelRenderError::PageCount {
                expected,
                got: pages.len(),
            });
        }
        Ok(RenderOutput {
            pages,
            diagnostics,
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_are_contiguous_and_balanced() {
        let ranges = chunk_ranges(10, 3);
        assert_eq!(ranges, vec![0..4, 4..7, 7..10]);
        assert_eq!(chunk_ranges(2, 8), vec![0..1, 1..2]);
        assert_eq!(chunk_ranges(5, 0), vec![0..5]);
        assert!(chunk_ranges(0, 4).is_empty());
    }

    fn fail(formatted: bool) {
        if formatted {
            panic!("{} {}", "formatted", "boom")
        } else {
            panic!("boom")
        }
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload = catch_unwind(|| fail(false)).unwrap_err();
        assert_eq!(panic_message(payload), "boom");
        let payload = catch_unwind(|| fail(true)).unwrap_err();
        assert_eq!(panic_message(payload), "formatted boom");
    }
}
