//! Procedural room textures.
//!
//! Every texture is a pure function of the texel coordinate, so the demo ships
//! without image assets. The mip chain is built on the CPU with a 2x2 box filter
//! and uploaded together with the base level.

/// Width and height of every generated texture.
pub const TEXTURE_SIZE: u32 = 256;

/// Number of mip levels uploaded: 256, 128, .. 2.
pub const MIP_LEVELS: u32 = 8;

const DARK: u32 = 0xff50_5050;
const LIGHT: u32 = 0xffb4_b4b4;
const MORTAR: u32 = 0xff3c_3c3c;
const WHITE: u32 = 0xffff_ffff;
const BLACK: u32 = 0xff00_0000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureFill {
    White,
    Wall,
    Floor,
    Ceiling,
    Grid,
    Gradient,
}

impl TextureFill {
    /// Packed `0xAARRGGBB` colour of texel `(i, j)` in a `size`x`size` image.
    pub fn texel(self, i: u32, j: u32, size: u32) -> u32 {
        match self {
            TextureFill::White => WHITE,
            TextureFill::Wall => {
                let (bi, bj) = (i / 4, j / 4);
                let horizontal = (bj & 15) == 0;
                // Vertical joints alternate between rows of bricks.
                let vertical = (bi & 15) == 0 && (((bi & 31) == 0) as u32 ^ ((bj >> 4) & 1)) == 0;
                if horizontal || vertical { MORTAR } else { LIGHT }
            }
            TextureFill::Floor => {
                if ((i >> 7) ^ (j >> 7)) & 1 == 1 {
                    LIGHT
                } else {
                    DARK
                }
            }
            TextureFill::Ceiling => {
                if i / 4 == 0 || j / 4 == 0 {
                    DARK
                } else {
                    LIGHT
                }
            }
            TextureFill::Grid => {
                let border = |v: u32| v < 4 || v + 5 > size;
                if border(i) || border(j) { WHITE } else { BLACK }
            }
            TextureFill::Gradient => BLACK + (i & 0xff) * 0x0001_0101,
        }
    }
}

/// A square ARGB image together with its mip chain.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    pub fill: TextureFill,
    /// Level 0 first; each level is row-major and half the size of the previous one.
    pub levels: Vec<Vec<u32>>,
}

impl TextureImage {
    pub fn generate(fill: TextureFill) -> Self {
        let size = TEXTURE_SIZE;
        let base = (0..size)
            .flat_map(|j| (0..size).map(move |i| fill.texel(i, j, size)))
            .collect::<Vec<_>>();

        let mut levels = Vec::with_capacity(MIP_LEVELS as usize);
        levels.push(base);
        for level in 1..MIP_LEVELS {
            let parent_size = size >> (level - 1);
            let next = downsample(&levels[level as usize - 1], parent_size);
            levels.push(next);
        }

        Self { fill, levels }
    }

    pub fn size(&self) -> u32 {
        TEXTURE_SIZE
    }

    /// Edge length of mip `level`.
    pub fn level_size(&self, level: usize) -> u32 {
        (TEXTURE_SIZE >> level).max(1)
    }

    /// The mip levels as raw bytes, in the same order as [`Self::levels`].
    pub fn level_bytes(&self) -> impl Iterator<Item = &[u8]> {
        self.levels.iter().map(|l| bytemuck::cast_slice(l.as_slice()))
    }
}

/// Halve a square image, averaging each 2x2 block per channel.
fn downsample(src: &[u32], size: u32) -> Vec<u32> {
    let half = (size / 2).max(1);
    let size = size as usize;
    let mut out = Vec::with_capacity((half * half) as usize);

    for y in 0..half as usize {
        for x in 0..half as usize {
            let block = [
                src[2 * y * size + 2 * x],
                src[2 * y * size + 2 * x + 1],
                src[(2 * y + 1) * size + 2 * x],
                src[(2 * y + 1) * size + 2 * x + 1],
            ];
            let channel = |shift: u32| {
                let sum: u32 = block.iter().map(|p| (p >> shift) & 0xff).sum();
                ((sum + 2) / 4) << shift
            };
            out.push(channel(24) | channel(16) | channel(8) | channel(0));
        }
    }
    out
}
