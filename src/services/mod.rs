pub mod azure_ocr;
pub mod ocr;
pub mod paperless;
pub mod processor;
pub mod transfer;
pub mod update;
pub mod worker;
