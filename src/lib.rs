pub mod bench;

pub mod config;

pub mod error;

pub mod inference;

pub mod loader;

pub mod loading {
    pub mod directory;
    pub mod hub;
}

pub mod model {
    pub mod files;
    pub mod config;
    pub mod model;
}

pub mod report;

pub mod tokenizer;

pub mod topk;

pub mod transformers {
    pub mod attention;
    pub mod conv1d;
    pub mod feed_forward;
    pub mod layer_norm;
    pub mod transformer;
    pub mod transformer_block;
}

pub mod testing {
    pub mod fakes;
}
