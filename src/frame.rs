// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 打包像素缓冲区与 RGB 图像之间的转换
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::RgbImage;
use thiserror::Error;

const RGB_CHANNELS: usize = 3;

/// 打包像素的通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
  Rgb,
  Bgr,
}

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("Row stride {stride} is smaller than row width {row}")]
  InvalidStride { stride: usize, row: usize },
}

/// 视频帧每行字节数按 4 字节对齐
pub fn aligned_stride(width: u32) -> usize {
  (width as usize * RGB_CHANNELS + 3) & !3
}

/// 将带行跨度的打包像素转换为 RGB 图像
///
/// `stride` 为每行实际占用的字节数，可能大于 `width * 3`。
pub fn rgb_image_from_packed(
  data: &[u8],
  width: u32,
  height: u32,
  stride: usize,
  order: ChannelOrder,
) -> Result<RgbImage, FrameError> {
  let row = width as usize * RGB_CHANNELS;
  if stride < row {
    return Err(FrameError::InvalidStride { stride, row });
  }

  let rows = height as usize;
  // 最后一行不要求补齐
  let expected = if rows == 0 {
    0
  } else {
    stride * (rows - 1) + row
  };
  if data.len() < expected {
    return Err(FrameError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  let mut pixels = Vec::with_capacity(row * rows);
  for y in 0..rows {
    let line = &data[y * stride..y * stride + row];
    match order {
      ChannelOrder::Rgb => pixels.extend_from_slice(line),
      ChannelOrder::Bgr => {
        for px in line.chunks_exact(RGB_CHANNELS) {
          pixels.extend_from_slice(&[px[2], px[1], px[0]]);
        }
      }
    }
  }

  RgbImage::from_raw(width, height, pixels).ok_or(FrameError::BufferSizeMismatch {
    expected: row * rows,
    actual: data.len(),
  })
}

/// 将 RGB 图像按给定行跨度重新打包，多余字节填零
pub fn packed_rows_with_stride(image: &RgbImage, stride: usize) -> Result<Vec<u8>, FrameError> {
  let row = image.width() as usize * RGB_CHANNELS;
  if stride < row {
    return Err(FrameError::InvalidStride { stride, row });
  }
  if stride == row {
    return Ok(image.as_raw().clone());
  }

  let mut data = vec![0u8; stride * image.height() as usize];
  for (y, line) in image.as_raw().chunks_exact(row).enumerate() {
    data[y * stride..y * stride + row].copy_from_slice(line);
  }
  Ok(data)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stride_is_four_byte_aligned() {
    assert_eq!(aligned_stride(4), 12);
    assert_eq!(aligned_stride(5), 16);
    assert_eq!(aligned_stride(1), 4);
  }

  #[test]
  fn packed_rgb_with_padding_is_unpacked() {
    // 2x2 图像，每行 6 字节数据 + 2 字节填充
    let data = [
      1, 2, 3, 4, 5, 6, 0, 0, //
      7, 8, 9, 10, 11, 12, 0, 0,
    ];
    let image = rgb_image_from_packed(&data, 2, 2, 8, ChannelOrder::Rgb).unwrap();
    assert_eq!(image.get_pixel(0, 0).0, [1, 2, 3]);
    assert_eq!(image.get_pixel(1, 1).0, [10, 11, 12]);
  }

  #[test]
  fn bgr_is_swapped_to_rgb() {
    let data = [3, 2, 1];
    let image = rgb_image_from_packed(&data, 1, 1, 3, ChannelOrder::Bgr).unwrap();
    assert_eq!(image.get_pixel(0, 0).0, [1, 2, 3]);
  }

  #[test]
  fn short_buffer_is_rejected() {
    let data = [0u8; 10];
    let result = rgb_image_from_packed(&data, 2, 2, 8, ChannelOrder::Rgb);
    assert!(matches!(
      result,
      Err(FrameError::BufferSizeMismatch {
        expected: 14,
        actual: 10
      })
    ));
  }

  #[test]
  fn repack_pads_each_row() {
    let image = RgbImage::from_raw(1, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
    let data = packed_rows_with_stride(&image, aligned_stride(1)).unwrap();
    assert_eq!(data, vec![1, 2, 3, 0, 4, 5, 6, 0]);
  }
}
