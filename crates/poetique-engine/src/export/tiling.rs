/// A4 portrait in PDF points.
pub const A4_WIDTH_PT: f64 = 595.28;
pub const A4_HEIGHT_PT: f64 = 841.89;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_pt: f64,
    pub height_pt: f64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width_pt: A4_WIDTH_PT,
            height_pt: A4_HEIGHT_PT,
        }
    }
}

impl PageGeometry {
    /// Height of a `bitmap_width x bitmap_height` image scaled to the page width.
    pub fn scaled_height(&self, bitmap_width: u32, bitmap_height: u32) -> f64 {
        if bitmap_width == 0 {
            return 0.0;
        }
        f64::from(bitmap_height) * self.width_pt / f64::from(bitmap_width)
    }

    /// Top offset of the full image on each page, `0, -P, -2P, ...`.
    ///
    /// Pages are added while image remains below the previous page, so a
    /// zero-height image still gets one page and an exact multiple of `P`
    /// gets no trailing blank page.
    pub fn tile_offsets(&self, image_height: f64) -> Vec<f64> {
        let page = self.height_pt;
        let mut offsets = vec![0.0];
        if page <= 0.0 {
            return offsets;
        }
        let mut height_left = image_height - page;
        while height_left > 0.0 {
            offsets.push(height_left - image_height);
            height_left -= page;
        }
        offsets
    }
}
