//! Rasterize EAN-13 symbols to PNG.

use std::io::Cursor;

use {
    image::{DynamicImage, GrayImage, ImageFormat, Luma},
    tracing::debug,
};

use crate::{
    ean13::{Ean13, MODULE_COUNT},
    error::{Error, Result},
};

/// Default width of a single module in pixels.
pub const DEFAULT_MODULE_WIDTH: u32 = 3;

/// Default height of a regular bar in pixels.
pub const DEFAULT_BAR_HEIGHT: u32 = 160;

/// Default quiet zone on each side, in modules.
pub const DEFAULT_QUIET_ZONE: u32 = 11;

/// 5x7 digit glyphs, one row per byte, bit 4 is the leftmost column.
const GLYPHS: [[u8; 7]; 10] = [
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
    [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
    [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
];
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// First module of the left and right data halves.
const LEFT_DATA: u32 = 3;
const RIGHT_DATA: u32 = 50;

const BLACK: Luma<u8> = Luma([0]);
const WHITE: Luma<u8> = Luma([255]);

/// Turns a 12/13-digit code into PNG image bytes.
pub trait BarcodeRenderer: Send + Sync {
    fn render(&self, code: &str) -> Result<Vec<u8>>;
}

/// Grayscale EAN-13 renderer.
#[derive(Debug, Clone)]
pub struct Ean13Renderer {
    pub module_width: u32,
    pub bar_height: u32,
    pub quiet_zone: u32,
    /// Print the digits under the bars.
    pub human_readable: bool,
}

impl Default for Ean13Renderer {
    fn default() -> Self {
        Self {
            module_width: DEFAULT_MODULE_WIDTH,
            bar_height: DEFAULT_BAR_HEIGHT,
            quiet_zone: DEFAULT_QUIET_ZONE,
            human_readable: true,
        }
    }
}

impl Ean13Renderer {
    /// Vertical padding above the bars and below the guard extensions.
    fn margin(&self) -> u32 {
        self.module_width * 5
    }

    /// How far guard bars extend below regular bars.
    fn guard_extension(&self) -> u32 {
        self.module_width * 5
    }

    /// Band under the regular bars: guard extensions, and the digits when
    /// printed (one module gap above and below each glyph).
    fn text_band(&self) -> u32 {
        if self.human_readable {
            self.module_width * (GLYPH_HEIGHT + 2)
        } else {
            self.guard_extension()
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let width = (MODULE_COUNT as u32 + 2 * self.quiet_zone) * self.module_width;
        let height = self.bar_height + self.text_band() + 2 * self.margin();
        (width, height)
    }

    /// Left edge, in modules from the image border, of each printed digit.
    ///
    /// Digits 1-6 and 7-12 sit centred in their 7-module data cells. The
    /// leading digit goes into the left quiet zone when it is wide enough.
    fn digit_columns(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        let leading = (self.quiet_zone > GLYPH_WIDTH)
            .then(|| (0, self.quiet_zone - GLYPH_WIDTH - 1));
        let data = (1..13).map(move |i| {
            let cell = if i < 7 {
                LEFT_DATA + (i as u32 - 1) * 7
            } else {
                RIGHT_DATA + (i as u32 - 7) * 7
            };
            (i, self.quiet_zone + cell + 1)
        });
        leading.into_iter().chain(data)
    }

    fn draw_digit(&self, img: &mut GrayImage, digit: u8, left: u32, top: u32) {
        let scale = self.module_width;
        for (row, bits) in GLYPHS[usize::from(digit)].iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if *bits & (1u8 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let x0 = left * scale + col * scale;
                let y0 = top + row as u32 * scale;
                for x in x0..x0 + scale {
                    for y in y0..y0 + scale {
                        img.put_pixel(x, y, BLACK);
                    }
                }
            }
        }
    }

    /// Draw the symbol for an already validated code.
    pub fn draw(&self, ean: &Ean13) -> GrayImage {
        let (width, height) = self.dimensions();
        let mut img = GrayImage::from_pixel(width, height, WHITE);
        let top = self.margin();

        for (index, dark) in ean.modules().into_iter().enumerate() {
            if !dark {
                continue;
            }
            let bar_bottom = if Ean13::is_guard_module(index) {
                top + self.bar_height + self.guard_extension()
            } else {
                top + self.bar_height
            };
            let x0 = (self.quiet_zone + index as u32) * self.module_width;
            for x in x0..x0 + self.module_width {
                for y in top..bar_bottom {
                    img.put_pixel(x, y, BLACK);
                }
            }
        }

        if self.human_readable {
            let text_top = top + self.bar_height + self.module_width;
            for (index, left) in self.digit_columns() {
                self.draw_digit(&mut img, ean.digits()[index], left, text_top);
            }
        }

        img
    }
}

impl BarcodeRenderer for Ean13Renderer {
    fn render(&self, code: &str) -> Result<Vec<u8>> {
        let ean = Ean13::parse(code)?;
        let img = self.draw(&ean);

        let mut output = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut output, ImageFormat::Png)
            .map_err(|e| Error::external("failed to encode barcode PNG", e))?;

        let data = output.into_inner();
        debug!(code, full = %ean, size = data.len(), "rendered barcode");
        Ok(data)
    }
}
