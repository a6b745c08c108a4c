//! Remote structure acquisition.
//!
//! Implements the core fetcher contract by streaming the requested entry
//! from the RCSB download service to disk. The engine calls the fetcher
//! synchronously from inside `block_in_place`, so the async request is
//! driven to completion on the runtime handle captured at construction.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use futures_util::StreamExt;
use mdprep::engine::input::{FetchFailure, StructureFetcher};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::error::Result;

const DOWNLOAD_BASE_URL: &str = "https://files.rcsb.org/download";

pub struct RcsbFetcher {
    client: reqwest::Client,
    handle: Handle,
}

impl RcsbFetcher {
    pub fn new(handle: Handle) -> Self {
        RcsbFetcher {
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        debug!(url, "Sending structure download request.");
        let response = self.client.get(url).send().await?.error_for_status()?;

        let mut file = File::create(dest)?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
        }
        debug!(bytes = downloaded, "Structure download complete.");
        Ok(())
    }
}

impl StructureFetcher for RcsbFetcher {
    fn fetch(&self, id: &str, dest: &Path) -> std::result::Result<(), FetchFailure> {
        let url = format!("{}/{}.pdb", DOWNLOAD_BASE_URL, id.to_ascii_uppercase());
        info!(id, "Downloading structure from the RCSB archive.");
        self.handle
            .block_on(self.download(&url, dest))
            .map_err(|e| FetchFailure {
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_url_is_uppercased_pdb_entry() {
        // The fetcher builds '<base>/<ID>.pdb'; spot-check the formatting
        // logic the fetch path relies on.
        let id = "6m0j";
        let url = format!("{}/{}.pdb", DOWNLOAD_BASE_URL, id.to_ascii_uppercase());
        assert_eq!(url, "https://files.rcsb.org/download/6M0J.pdb");
    }
}
