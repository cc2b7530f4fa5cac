//! Extraction utilities for third-party HTML and embedded JSON
//!
//! Pure functions, no network or storage. Third-party markup is adversarial:
//! malformed JSON-LD blocks, drifting embedded-state shapes and locale-heavy
//! price strings are all expected inputs here, so the failure mode throughout
//! is "return nothing", never an error.

pub mod embedded_state;
pub mod gpu_page;
pub mod json_ld;
pub mod price;
pub mod spec_table;
pub mod text;

pub use embedded_state::{Hop, descend, extract_next_data};
pub use gpu_page::{is_consumer_target_text, is_consumer_target_url, parse_gpu_spec_page};
pub use json_ld::{collect_product_nodes, extract_json_ld_blocks};
pub use price::parse_price_to_cents;
pub use text::{html_to_text, parse_og_image, parse_title, strip_tags};
