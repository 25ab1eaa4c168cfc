//! Chunk planning: splitting the pending file list into attempt chunks
//! (the manifest's `batch_size` grouping) and, for ToolF, further into
//! technical chunks sized to a command-length budget (spec §4.6).

use camino::Utf8PathBuf;
use dcmrelay_types::Toolkit;

/// One attempt chunk: the group of pending files a single
/// `analysis_summary.chunks_total` slot corresponds to.
#[derive(Debug, Clone)]
pub struct AttemptChunk {
    pub chunk_no: u64,
    pub files: Vec<Utf8PathBuf>,
}

/// Split `pending` (already in manifest order) into attempt chunks of at
/// most `batch_size` files each, numbered from `first_chunk_no` — the
/// attempt-chunk number the first pending file falls into, so chunk
/// numbering survives a resume that skips files from earlier chunks.
#[must_use]
pub fn plan_attempt_chunks(pending: &[Utf8PathBuf], batch_size: u64, first_chunk_no: u64) -> Vec<AttemptChunk> {
    if pending.is_empty() || batch_size == 0 {
        return Vec::new();
    }
    let batch_size = batch_size as usize;
    pending
        .chunks(batch_size)
        .enumerate()
        .map(|(i, files)| AttemptChunk {
            chunk_no: first_chunk_no + i as u64,
            files: files.to_vec(),
        })
        .collect()
}

/// Split one attempt chunk's files into technical chunks: sub-batches that
/// fit the toolkit's command-length budget. ToolT always sends one
/// technical chunk per attempt chunk (its invocation lists files through a
/// `@argfile`, so argv length never grows with file count); ToolF splits at
/// `batch_max_cmd` files per invocation since it lists files directly on
/// argv (spec §4.4/§4.6, grounded on `batch.rs`'s ceiling).
#[must_use]
pub fn plan_technical_chunks(toolkit: Toolkit, files: &[Utf8PathBuf], batch_max_cmd: u64) -> Vec<Vec<Utf8PathBuf>> {
    if files.is_empty() {
        return Vec::new();
    }
    match toolkit {
        Toolkit::ToolT => vec![files.to_vec()],
        Toolkit::ToolF => {
            let cap = if batch_max_cmd == 0 { files.len() } else { batch_max_cmd as usize };
            files.chunks(cap.max(1)).map(<[Utf8PathBuf]>::to_vec).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(n: usize) -> Vec<Utf8PathBuf> {
        (0..n).map(|i| Utf8PathBuf::from(format!("/data/f{i}.dcm"))).collect()
    }

    #[test]
    fn attempt_chunks_respect_batch_size_and_numbering_offset() {
        let pending = paths(5);
        let chunks = plan_attempt_chunks(&pending, 2, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chunk_no, 3);
        assert_eq!(chunks[0].files.len(), 2);
        assert_eq!(chunks[2].files.len(), 1);
    }

    #[test]
    fn empty_pending_yields_no_chunks() {
        assert!(plan_attempt_chunks(&[], 10, 1).is_empty());
    }

    #[test]
    fn toolt_never_splits_into_multiple_technical_chunks() {
        let files = paths(50);
        let chunks = plan_technical_chunks(Toolkit::ToolT, &files, 3);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 50);
    }

    #[test]
    fn toolf_splits_at_batch_max_cmd() {
        let files = paths(7);
        let chunks = plan_technical_chunks(Toolkit::ToolF, &files, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 3);
        assert_eq!(chunks[2].len(), 1);
    }

    #[test]
    fn toolf_zero_batch_max_cmd_keeps_single_chunk() {
        let files = paths(4);
        let chunks = plan_technical_chunks(Toolkit::ToolF, &files, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 4);
    }
}
