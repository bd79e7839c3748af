use rust_embed::Embed;

/// The page and its assets, compiled into the binary.
#[derive(Embed)]
#[folder = "$CARGO_MANIFEST_DIR/ui/"]
pub struct Assets;
