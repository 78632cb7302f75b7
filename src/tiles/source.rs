use crate::core::geo::TileCoord;

/// Trait representing anything that can produce tile URLs for a given
/// coordinate. The `name` doubles as the tileset directory in the disk
/// cache layout.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url_for(&self, coord: TileCoord) -> String;

    /// Stable tileset name, used for the on-disk directory.
    fn name(&self) -> &str;
}

/// Default provider: the Carto dark basemap at @2x resolution.
pub struct CartoDarkSource {
    subdomains: Vec<&'static str>,
}

impl CartoDarkSource {
    pub fn new() -> Self {
        Self {
            subdomains: vec!["a", "b", "c", "d"],
        }
    }
}

impl Default for CartoDarkSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TileSource for CartoDarkSource {
    fn url_for(&self, coord: TileCoord) -> String {
        // Subdomain keyed on (x + y) so a tile always maps to the same host.
        let idx = ((coord.x + coord.y) % self.subdomains.len() as u32) as usize;
        format!(
            "https://{}.basemaps.cartocdn.com/dark_all/{}/{}/{}@2x.png",
            self.subdomains[idx], coord.z, coord.x, coord.y
        )
    }

    fn name(&self) -> &str {
        "dark_all"
    }
}

/// Generic provider built from a `{s}/{z}/{x}/{y}` URL template.
pub struct TemplateSource {
    name: String,
    template: String,
    subdomains: Vec<String>,
}

impl TemplateSource {
    pub fn new(
        name: impl Into<String>,
        template: impl Into<String>,
        subdomains: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            subdomains,
        }
    }
}

impl TileSource for TemplateSource {
    fn url_for(&self, coord: TileCoord) -> String {
        let mut url = self.template.clone();
        if !self.subdomains.is_empty() {
            let idx = ((coord.x + coord.y) % self.subdomains.len() as u32) as usize;
            url = url.replace("{s}", &self.subdomains[idx]);
        }
        url.replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
