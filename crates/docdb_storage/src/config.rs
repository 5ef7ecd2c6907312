//! Store configuration.
//!
//! Defaults target small-memory edge deployments: tiny write buffer and
//! block cache, bounded file handles, bloom filters sized for point
//! lookups, and a short fixed prefix for hash-skip-list memtable scans.

use rocksdb::{
    BlockBasedIndexType, BlockBasedOptions, Cache, DBCompressionType, MemtableFactory, Options,
};

/// Configuration for opening a [`crate::Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to create the database directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Size of each memtable write buffer, in bytes.
    pub write_buffer_size: usize,

    /// Size of the shared block cache, in bytes.
    pub block_cache_size: usize,

    /// SST block size, in bytes. Small blocks favor random point reads.
    pub block_size: usize,

    /// Maximum number of open file handles.
    pub max_open_files: i32,

    /// Bloom filter bits per key.
    pub bloom_bits_per_key: f64,

    /// Fixed prefix length for the prefix extractor.
    pub prefix_length: usize,

    /// Maximum concurrent background jobs (flushes + compactions).
    pub max_background_jobs: i32,

    /// Whether to compress SST blocks with a fast codec. Off by default;
    /// point-read latency beats disk savings on the target hardware.
    pub compression: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            write_buffer_size: 4 * 1024 * 1024,
            block_cache_size: 8 * 1024 * 1024,
            block_size: 4 * 1024,
            max_open_files: 64,
            bloom_bits_per_key: 10.0,
            prefix_length: 8,
            max_background_jobs: 2,
            compression: false,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the write buffer size in bytes.
    #[must_use]
    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.write_buffer_size = bytes;
        self
    }

    /// Sets the block cache size in bytes.
    #[must_use]
    pub fn block_cache_size(mut self, bytes: usize) -> Self {
        self.block_cache_size = bytes;
        self
    }

    /// Sets the maximum number of open files.
    #[must_use]
    pub fn max_open_files(mut self, count: i32) -> Self {
        self.max_open_files = count;
        self
    }

    /// Enables or disables block compression.
    #[must_use]
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Builds the tuned substrate options.
    ///
    /// The same options are used for the database itself and for every
    /// keyspace created later, so all keyspaces share the tuning.
    pub(crate) fn substrate_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(self.create_if_missing);

        opts.set_max_open_files(self.max_open_files);
        opts.set_write_buffer_size(self.write_buffer_size);
        opts.set_max_write_buffer_number(2);
        opts.set_min_write_buffer_number_to_merge(1);
        opts.set_level_zero_file_num_compaction_trigger(2);
        opts.set_max_background_jobs(self.max_background_jobs);

        opts.set_enable_pipelined_write(true);
        // The hash-skip-list memtable does not support concurrent writes.
        opts.set_allow_concurrent_memtable_write(false);
        opts.set_memtable_factory(MemtableFactory::HashSkipList {
            bucket_count: 4096,
            height: 4,
            branching_factor: 4,
        });
        opts.set_prefix_extractor(rocksdb::SliceTransform::create_fixed_prefix(
            self.prefix_length,
        ));
        opts.set_memtable_prefix_bloom_ratio(0.1);

        opts.set_level_compaction_dynamic_level_bytes(false);
        opts.set_max_bytes_for_level_base(16 * 1024 * 1024);
        opts.set_max_bytes_for_level_multiplier(8.0);
        opts.set_optimize_filters_for_hits(true);

        opts.set_compression_type(if self.compression {
            DBCompressionType::Lz4
        } else {
            DBCompressionType::None
        });

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_size(self.block_size);
        block_opts.set_block_cache(&Cache::new_lru_cache(self.block_cache_size));
        block_opts.set_bloom_filter(self.bloom_bits_per_key, false);
        block_opts.set_cache_index_and_filter_blocks(true);
        block_opts.set_index_type(BlockBasedIndexType::TwoLevelIndexSearch);
        opts.set_block_based_table_factory(&block_opts);

        opts
    }
}
