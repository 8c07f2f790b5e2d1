#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use fsds_pipeline::app::ports::{ArchiveFetcher, CatalogTrigger};
use fsds_pipeline::{Period, PipelineError, Result};
use zip::write::SimpleFileOptions;

pub const SUB: &str = "adsh\tcik\tname\tsic\tcountryba\tform\tperiod\tfy\tfp\tfiled\n\
A1\t1\tAcme\t3571\tUS\t10-K\t20221231\t2022\tFY\t20230101\n\
A2\t2\tGlobex\t3572\tUS\t10-Q\t20220930\t2022\tQ3\t20221105\n\
A3\t3\t\t3573\tUS\t10-Q\t20220930\t2022\tQ3\t20221106\n";

pub const TAG: &str = "tag\tversion\tcustom\tabstract\tdatatype\tiord\tcrdr\ttlabel\tdoc\n\
Revenue\tus-gaap/2022\t0\t0\tmonetary\tD\tC\tTotal Revenue\tAmount of revenue.\n\
Assets\tus-gaap/2022\t0\t0\tmonetary\tI\tD\tTotal Assets\tSum of assets.\n\
NoLabel\tus-gaap/2022\t0\t0\tmonetary\tI\tD\t\t\n";

pub const NUM: &str = "adsh\ttag\tversion\tcoreg\tddate\tqtrs\tuom\tvalue\tfootnote\n\
A1\tRevenue\tus-gaap/2022\t\t20221231\t4\tUSD\t1000.0\t\n\
A1\tRevenue\tus-gaap/2022\t\t20221231\t4\tEUR\t5.0\t\n\
A1\tAssets\tus-gaap/2022\t\t20221231\t0\tUSD\t2500.5\t\n\
A2\tRevenue\tus-gaap/2022\t\t20220930\t1\tUSD\t300.0\tRestated\n\
A2\tAssets\tus-gaap/2022\t\t20220930\t0\tUSD\t\t\n\
A3\tRevenue\tus-gaap/2022\t\t20220930\t1\tUSD\t7.0\t\n\
A9\tRevenue\tus-gaap/2022\t\t20220930\t1\tUSD\t8.0\t\n\
A1\tNoLabel\tus-gaap/2022\t\t20221231\t0\tUSD\t9.0\t\n\
A1\tCustomTag\tA1\t\t20221231\t0\tUSD\t10.0\t\n";

/// Rows of `NUM` that survive the USD filter and both joins.
pub const EXPECTED_ROWS: usize = 4;

pub const NUM_NO_USD: &str = "adsh\ttag\tversion\tcoreg\tddate\tqtrs\tuom\tvalue\tfootnote\n\
A1\tRevenue\tus-gaap/2022\t\t20221231\t4\tEUR\t5.0\t\n\
A1\tRevenue\tus-gaap/2022\t\t20221231\t4\tshares\t100\t\n";

pub fn build_archive(sub: &str, num: &str, tag: &str) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        for (name, content) in [("sub.txt", sub), ("num.txt", num), ("tag.txt", tag), ("readme.htm", "<html/>")] {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf.into_inner()
}

pub fn period(s: &str) -> Period {
    s.parse().unwrap()
}

/// Serves archives from memory; unknown periods answer "not found".
#[derive(Default)]
pub struct FakeFetcher {
    archives: HashMap<Period, Vec<u8>>,
    failing: Vec<Period>,
    pub calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn with(mut self, period: Period, archive: Vec<u8>) -> Self {
        self.archives.insert(period, archive);
        self
    }

    pub fn failing(mut self, period: Period) -> Self {
        self.failing.push(period);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveFetcher for FakeFetcher {
    async fn fetch(&self, period: Period) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&period) {
            return Err(PipelineError::Upstream { status: 503, url: period.archive_name() });
        }
        self.archives.get(&period).cloned().ok_or(PipelineError::NotYetPublished(period))
    }
}

#[derive(Default)]
pub struct RecordingCatalog {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl RecordingCatalog {
    pub fn failing() -> Self {
        Self { fail: true, calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogTrigger for RecordingCatalog {
    async fn trigger(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(PipelineError::catalog("crawler does not exist"))
        } else {
            Ok(())
        }
    }
}
