//! Chunked parallel execution of worker calls.
//!
//! The work `[0, max_len)` is cut in consecutive chunks of `num_thread` indexes, the last one
//! may be shorter. Chunks run strictly one after the other : for each chunk a thread pool sized
//! to the chunk is built, all the indexes of the chunk are dispatched to it, and we wait for the
//! whole chunk before the next. Results come back in index order whatever the chunk boundaries.
//! A failing call aborts the chunk and the run.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use std::ops::Range;
use std::time::SystemTime;

use cpu_time::ProcessTime;

use crate::embedding::{EmbedContext, EmbeddingOutput, MomentEmbedderT};
use crate::errors::StudyError;

/// returns the ranges of indexes of each chunk
pub fn get_chunks(max_len: usize, num_thread: usize) -> anyhow::Result<Vec<Range<usize>>> {
    if num_thread == 0 {
        return Err(StudyError::configuration("number of threads must be at least 1").into());
    }
    let nb_chunk = max_len / num_thread + if max_len % num_thread > 0 { 1 } else { 0 };
    let chunks = (0..nb_chunk)
        .map(|i| {
            let start = num_thread * i;
            let end = (num_thread * (i + 1)).min(max_len);
            start..end
        })
        .collect();
    Ok(chunks)
} // end of get_chunks

#[derive(Copy, Clone, Debug)]
pub struct BatchRunner {
    /// number of indexes in a chunk, also the size of the pool of a chunk
    num_thread: usize,
    /// if false calls are made sequentially in the coordinating thread
    use_pool: bool,
    /// display a progress bar over chunks
    progress: bool,
}

impl BatchRunner {
    pub fn new(num_thread: usize) -> Self {
        BatchRunner { num_thread, use_pool: true, progress: false }
    }

    /// sequential fallback, same output as pooled execution
    pub fn sequential(num_thread: usize) -> Self {
        BatchRunner { num_thread, use_pool: false, progress: false }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn get_num_thread(&self) -> usize {
        self.num_thread
    }

    fn make_progress_bar(&self, nb_chunk: usize) -> anyhow::Result<ProgressBar> {
        if !self.progress {
            return Ok(ProgressBar::hidden());
        }
        let pb = ProgressBar::new(nb_chunk as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} {bar:40} {pos}/{len} chunks ({eta})")?
                .progress_chars("##-"),
        );
        Ok(pb)
    }

    fn run_chunk<T, F>(&self, chunk: Range<usize>, f: &F) -> anyhow::Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> anyhow::Result<T> + Sync,
    {
        if !self.use_pool {
            return chunk.map(f).collect();
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(chunk.len())
            .build()?;
        // collect on an indexed parallel iterator keeps index order
        pool.install(|| chunk.into_par_iter().map(f).collect::<anyhow::Result<Vec<T>>>())
    } // end of run_chunk

    /// runs f on every index of `[0, max_len)` and returns results in index order.
    pub fn run<T, F>(&self, max_len: usize, f: F) -> anyhow::Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> anyhow::Result<T> + Sync,
    {
        let chunks = get_chunks(max_len, self.num_thread)?;
        log::info!("BatchRunner::run, work size {}, {} chunks of at most {}", max_len, chunks.len(), self.num_thread);
        let cpu_start = ProcessTime::now();
        let sys_start = SystemTime::now();
        let pb = self.make_progress_bar(chunks.len())?;
        pb.set_message("embedding");
        //
        let mut results = Vec::<T>::with_capacity(max_len);
        for chunk in chunks {
            log::debug!("running chunk {:?}", chunk);
            let part = self.run_chunk(chunk, &f)?;
            results.extend(part);
            pb.inc(1);
        }
        pb.finish_and_clear();
        log::info!(
            "BatchRunner::run sys time(s) {:.2e} cpu time(s) {:.2e}",
            sys_start.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.),
            cpu_start.elapsed().as_secs_f64()
        );
        Ok(results)
    } // end of run

    /// runs the embedder on every unit of work of the context
    pub fn run_embedder(
        &self,
        embedder: &dyn MomentEmbedderT,
        context: &EmbedContext,
    ) -> anyhow::Result<Vec<EmbeddingOutput>> {
        let max_len = context.get_work_size();
        self.run(max_len, |i| embedder.embed(context, i))
    }
} // end of impl BatchRunner

#[cfg(test)]
mod tests {

    use super::*;
    use parking_lot::Mutex;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn chunks_of_7_by_3() {
        log_init_test();
        let chunks = get_chunks(7, 3).unwrap();
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(chunks[2], 6..7);
        assert!(get_chunks(0, 3).unwrap().is_empty());
        assert!(get_chunks(5, 0).is_err());
    } // end of chunks_of_7_by_3

    #[test]
    fn echo_keeps_order() {
        log_init_test();
        // each call returns its index and the size of the pool it ran in
        let res = BatchRunner::new(3)
            .run(7, |i| Ok((i, rayon::current_num_threads())))
            .unwrap();
        let idx: Vec<usize> = res.iter().map(|r| r.0).collect();
        assert_eq!(idx, (0..7).collect::<Vec<usize>>());
        let pools: Vec<usize> = res.iter().map(|r| r.1).collect();
        assert_eq!(pools, vec![3, 3, 3, 3, 3, 3, 1]);
    } // end of echo_keeps_order

    #[test]
    fn sequential_is_same() {
        log_init_test();
        let f = |i: usize| -> anyhow::Result<usize> { Ok(i * i) };
        let pooled = BatchRunner::new(4).run(10, f).unwrap();
        let sequential = BatchRunner::sequential(4).run(10, f).unwrap();
        assert_eq!(pooled, sequential);
    } // end of sequential_is_same

    #[test]
    fn chunks_are_sequential() {
        log_init_test();
        // record in which order chunks start, a chunk must not begin before the previous is done
        let seen = Mutex::new(Vec::<usize>::new());
        BatchRunner::new(2)
            .run(6, |i| {
                std::thread::sleep(std::time::Duration::from_millis(((6 - i) * 3) as u64));
                seen.lock().push(i / 2);
                Ok(())
            })
            .unwrap();
        let seen = seen.into_inner();
        assert_eq!(seen.len(), 6);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    } // end of chunks_are_sequential

    #[test]
    fn failure_aborts() {
        log_init_test();
        let res = BatchRunner::new(3).run(7, |i| {
            if i == 4 {
                Err(anyhow::anyhow!("worker {} failed", i))
            } else {
                Ok(i)
            }
        });
        assert!(res.is_err());
    } // end of failure_aborts
} // end of mod tests
