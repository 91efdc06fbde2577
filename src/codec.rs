// 该文件是 Shanan （山南西风） 项目的一部分。
// src/codec.rs - 像素缓冲区与张量之间的编解码
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

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
  frame::{FrameError, RGBA_CHANNELS, RgbaFrame},
  geometry::{Dimensions, GeometryError, compute_letterbox},
  tensor::{Tensor, TensorError},
};

const RGB_CHANNELS: usize = 3;

pub const IMAGE_TENSOR_NAME: &str = "image";
pub const PRIOR_MASK_TENSOR_NAME: &str = "mask_input";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
  #[error("尺寸无效: {0}")]
  InvalidDimensions(#[from] GeometryError),
  #[error("编码错误: {0}")]
  Encoding(String),
  #[error("解码错误: {0}")]
  Decoding(String),
  #[error("尺寸不一致: 期望 {expected}, 实际 {actual}")]
  DimensionMismatch {
    expected: Dimensions,
    actual: Dimensions,
  },
  #[error("没有可合并的掩码")]
  NothingToMerge,
}

impl From<FrameError> for CodecError {
  fn from(err: FrameError) -> Self {
    CodecError::Encoding(err.to_string())
  }
}

impl From<TensorError> for CodecError {
  fn from(err: TensorError) -> Self {
    CodecError::Encoding(err.to_string())
  }
}

/// 逐通道归一化参数：先缩放到 `[0,1]`，再 `(v - mean) / std`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
  pub mean: [f32; 3],
  pub std: [f32; 3],
}

impl Default for Normalization {
  fn default() -> Self {
    Self {
      mean: [0.485, 0.456, 0.406],
      std: [0.229, 0.224, 0.225],
    }
  }
}

impl Normalization {
  pub fn validate(&self) -> Result<(), String> {
    if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
      return Err(format!("归一化标准差必须为正数: {:?}", self.std));
    }
    if self.mean.iter().any(|m| !m.is_finite()) {
      return Err(format!("归一化均值必须为有限值: {:?}", self.mean));
    }
    Ok(())
  }

  fn apply(&self, channel: usize, value: u8) -> f32 {
    (value as f32 / 255.0 - self.mean[channel]) / self.std[channel]
  }
}

/// 掩码浮点值到 alpha 的映射方式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AlphaMode {
  /// 大于阈值为不透明，否则透明
  Binary { threshold: f32 },
  /// 将 logit 经 sigmoid 缩放到 0..=255
  Sigmoid,
}

impl Default for AlphaMode {
  fn default() -> Self {
    AlphaMode::Binary { threshold: 0.0 }
  }
}

impl AlphaMode {
  fn alpha(&self, value: f32) -> u8 {
    if !value.is_finite() {
      return 0;
    }
    match *self {
      AlphaMode::Binary { threshold } => {
        if value > threshold {
          255
        } else {
          0
        }
      }
      AlphaMode::Sigmoid => (sigmoid(value) * 255.0).round() as u8,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStyle {
  pub color: [u8; 3],
  #[serde(default)]
  pub alpha: AlphaMode,
}

impl Default for MaskStyle {
  fn default() -> Self {
    Self {
      color: [0, 114, 189],
      alpha: AlphaMode::default(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFilter {
  Nearest,
  #[default]
  Bilinear,
}

impl From<ResizeFilter> for FilterType {
  fn from(filter: ResizeFilter) -> Self {
    match filter {
      ResizeFilter::Nearest => FilterType::Nearest,
      ResizeFilter::Bilinear => FilterType::Triangle,
    }
  }
}

/// 掩码非透明像素的包围盒（含端点）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskBounds {
  pub left: u32,
  pub top: u32,
  pub right: u32,
  pub bottom: u32,
}

impl MaskBounds {
  pub fn width(&self) -> u32 {
    self.right - self.left + 1
  }

  pub fn height(&self) -> u32 {
    self.bottom - self.top + 1
  }
}

/// 将任意尺寸的 RGBA 帧信箱缩放到 `target`，输出 `[1,3,H,W]` 的平面归一化张量
pub fn encode_image_tensor(
  frame: &RgbaFrame,
  target: Dimensions,
  norm: &Normalization,
) -> Result<Tensor, CodecError> {
  let target = target.validate()?;
  norm.validate().map_err(CodecError::Encoding)?;

  let placement = compute_letterbox(frame.dims(), target)?;
  let (bx, by, bw, bh) = placement.to_pixels();
  let bw = bw.min(target.w - bx);
  let bh = bh.min(target.h - by);
  debug!(
    "图像 {} 信箱缩放到 {}: 偏移 ({}, {}), 尺寸 {}x{}",
    frame.dims(),
    target,
    bx,
    by,
    bw,
    bh
  );

  let resized = if frame.dims() == Dimensions::new(bw, bh) {
    frame.to_rgba_image()?
  } else {
    imageops::resize(&frame.to_rgba_image()?, bw, bh, FilterType::Triangle)
  };

  let width = target.w as usize;
  let plane = target.area();
  let mut data = vec![0f32; RGB_CHANNELS * plane];

  // 填充区域按像素值 0 归一化
  for c in 0..RGB_CHANNELS {
    let pad = norm.apply(c, 0);
    data[c * plane..(c + 1) * plane].fill(pad);
  }

  for (x, y, pixel) in resized.enumerate_pixels() {
    let idx = (y + by) as usize * width + (x + bx) as usize;
    for c in 0..RGB_CHANNELS {
      data[c * plane + idx] = norm.apply(c, pixel[c]);
    }
  }

  let dims = vec![1, RGB_CHANNELS, target.h as usize, target.w as usize];
  Ok(Tensor::new(IMAGE_TENSOR_NAME, dims, data)?)
}

/// 从原始 RGBA 字节编码，空缓冲区或通道数据缺失时返回 `Encoding` 错误
pub fn encode_rgba_bytes(
  data: &[u8],
  dims: Dimensions,
  target: Dimensions,
  norm: &Normalization,
) -> Result<Tensor, CodecError> {
  if data.is_empty() {
    return Err(CodecError::Encoding("像素缓冲区为空".to_string()));
  }
  if data.len() % RGBA_CHANNELS != 0 {
    return Err(CodecError::Encoding(format!(
      "像素缓冲区长度 {} 不是 {} 的整数倍, 通道数据缺失",
      data.len(),
      RGBA_CHANNELS
    )));
  }
  let frame = RgbaFrame::new(dims, data.to_vec())?;
  encode_image_tensor(&frame, target, norm)
}

/// 单通道掩码张量转为 RGBA：RGB 为高亮色，alpha 由浮点值决定
pub fn decode_mask_tensor(
  mask: &Tensor,
  dims: Dimensions,
  style: &MaskStyle,
) -> Result<RgbaFrame, CodecError> {
  let dims = dims.validate()?;
  if mask.len() != dims.area() {
    return Err(CodecError::Decoding(format!(
      "掩码张量 {} 有 {} 个元素, 与 {} 不符",
      mask.name(),
      mask.len(),
      dims
    )));
  }

  let [r, g, b] = style.color;
  let mut data = Vec::with_capacity(dims.area() * RGBA_CHANNELS);
  for &value in mask.data() {
    data.extend_from_slice(&[r, g, b, style.alpha.alpha(value)]);
  }

  RgbaFrame::new(dims, data).map_err(|e| CodecError::Decoding(e.to_string()))
}

fn check_dims(frame: &RgbaFrame, expected: Dimensions) -> Result<(), CodecError> {
  if frame.dims() != expected {
    return Err(CodecError::DimensionMismatch {
      expected,
      actual: frame.dims(),
    });
  }
  Ok(())
}

/// 重采样掩码缓冲区，通道按所选滤波器插值
pub fn resize_alpha_buffer(
  frame: &RgbaFrame,
  from: Dimensions,
  to: Dimensions,
  filter: ResizeFilter,
) -> Result<RgbaFrame, CodecError> {
  check_dims(frame, from)?;
  let to = to.validate()?;
  if from == to {
    return Ok(frame.clone());
  }

  let resized = imageops::resize(&frame.to_rgba_image()?, to.w, to.h, filter.into());
  Ok(RgbaFrame::try_from(resized)?)
}

/// 逐像素取 alpha 最大值合并多个掩码，RGB 取自提供最大值的缓冲区
pub fn merge_alpha_buffers(buffers: &[RgbaFrame]) -> Result<RgbaFrame, CodecError> {
  let (first, rest) = buffers.split_first().ok_or(CodecError::NothingToMerge)?;
  for frame in rest {
    check_dims(frame, first.dims())?;
  }

  let mut merged = first.clone();
  for frame in rest {
    let dst = merged.as_mut();
    for (out, px) in dst
      .chunks_exact_mut(RGBA_CHANNELS)
      .zip(frame.as_raw().chunks_exact(RGBA_CHANNELS))
    {
      if px[3] > out[3] {
        out.copy_from_slice(px);
      }
    }
  }

  Ok(merged)
}

/// 将图像居中贴到边长为其较长边的透明正方形画布上
pub fn pad_to_square(frame: &RgbaFrame) -> Result<RgbaFrame, CodecError> {
  let dims = frame.dims();
  if dims.is_square() {
    return Ok(frame.clone());
  }

  let side = dims.w.max(dims.h);
  let square = Dimensions::square(side);
  let placement = compute_letterbox(dims, square)?;
  let (ox, oy, _, _) = placement.to_pixels();

  let mut canvas = RgbaFrame::transparent(square)?;
  let row = dims.w as usize * RGBA_CHANNELS;
  let stride = side as usize * RGBA_CHANNELS;
  let src = frame.as_raw();
  let dst = canvas.as_mut();
  for y in 0..dims.h as usize {
    let start = (y + oy as usize) * stride + ox as usize * RGBA_CHANNELS;
    dst[start..start + row].copy_from_slice(&src[y * row..(y + 1) * row]);
  }

  Ok(canvas)
}

/// 将掩码缓冲区转回 `[1,1,mh,mw]` 的先验掩码张量（alpha > 0 为 1.0）
pub fn mask_to_prior_tensor(
  mask: &RgbaFrame,
  mask_dims: Dimensions,
) -> Result<Tensor, CodecError> {
  let resized = resize_alpha_buffer(mask, mask.dims(), mask_dims, ResizeFilter::Nearest)?;
  let data = resized
    .alphas()
    .map(|a| if a > 0 { 1.0 } else { 0.0 })
    .collect();
  let dims = vec![1, 1, mask_dims.h as usize, mask_dims.w as usize];
  Tensor::new(PRIOR_MASK_TENSOR_NAME, dims, data).map_err(|e| CodecError::Decoding(e.to_string()))
}

/// 抠图：图像像素的 alpha 乘以掩码 alpha
pub fn apply_mask(image: &RgbaFrame, mask: &RgbaFrame) -> Result<RgbaFrame, CodecError> {
  check_dims(mask, image.dims())?;

  let mut out = image.clone();
  for (px, alpha) in out.as_mut().chunks_exact_mut(RGBA_CHANNELS).zip(mask.alphas()) {
    px[3] = ((px[3] as u16 * alpha as u16 + 127) / 255) as u8;
  }
  Ok(out)
}

/// 以给定不透明度将掩码颜色叠加到图像上
pub fn overlay_mask(
  image: &RgbaFrame,
  mask: &RgbaFrame,
  opacity: f32,
) -> Result<RgbaFrame, CodecError> {
  check_dims(mask, image.dims())?;
  let opacity = opacity.clamp(0.0, 1.0);

  let mut out = image.clone();
  for (px, m) in out
    .as_mut()
    .chunks_exact_mut(RGBA_CHANNELS)
    .zip(mask.as_raw().chunks_exact(RGBA_CHANNELS))
  {
    let k = m[3] as f32 / 255.0 * opacity;
    for c in 0..RGB_CHANNELS {
      px[c] = (px[c] as f32 * (1.0 - k) + m[c] as f32 * k).round() as u8;
    }
  }
  Ok(out)
}

/// 将模型空间的掩码映射回原图：裁掉信箱填充区域后按双线性重采样到 `image`
pub fn project_mask_to_image(
  mask: &RgbaFrame,
  image: Dimensions,
) -> Result<RgbaFrame, CodecError> {
  let placement = compute_letterbox(image, mask.dims())?;
  let (x, y, w, h) = placement.to_pixels();
  let w = w.min(mask.width() - x);
  let h = h.min(mask.height() - y);

  let cropped = if (x, y, w, h) == (0, 0, mask.width(), mask.height()) {
    mask.clone()
  } else {
    RgbaFrame::try_from(imageops::crop_imm(&mask.to_rgba_image()?, x, y, w, h).to_image())?
  };
  resize_alpha_buffer(&cropped, cropped.dims(), image, ResizeFilter::Bilinear)
}

pub fn mask_bounds(mask: &RgbaFrame) -> Option<MaskBounds> {
  let mut bounds: Option<MaskBounds> = None;
  let width = mask.width();

  for (i, alpha) in mask.alphas().enumerate() {
    if alpha == 0 {
      continue;
    }
    let x = i as u32 % width;
    let y = i as u32 / width;
    bounds = Some(match bounds {
      None => MaskBounds {
        left: x,
        top: y,
        right: x,
        bottom: y,
      },
      Some(b) => MaskBounds {
        left: b.left.min(x),
        top: b.top.min(y),
        right: b.right.max(x),
        bottom: b.bottom.max(y),
      },
    });
  }

  bounds
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn mask_frame(dims: Dimensions, alphas: &[u8]) -> RgbaFrame {
    let data = alphas.iter().flat_map(|&a| [10, 20, 30, a]).collect();
    RgbaFrame::new(dims, data).unwrap()
  }

  #[test]
  fn test_encode_image_tensor_shape() {
    let frame = RgbaFrame::filled(Dimensions::new(40, 20), [255, 128, 0, 255]).unwrap();
    let target = Dimensions::new(16, 16);
    let tensor = encode_image_tensor(&frame, target, &Normalization::default()).unwrap();
    assert_eq!(tensor.dims(), &[1, 3, 16, 16]);
    assert_eq!(tensor.len(), 3 * 16 * 16);
  }

  #[test]
  fn test_encode_image_tensor_planar_layout() {
    let norm = Normalization {
      mean: [0.0; 3],
      std: [1.0; 3],
    };
    let mut frame = RgbaFrame::filled(Dimensions::new(2, 2), [0, 0, 0, 255]).unwrap();
    frame.put_pixel(1, 0, [255, 51, 102, 255]);
    let tensor = encode_image_tensor(&frame, Dimensions::new(2, 2), &norm).unwrap();
    let data = tensor.data();
    // 平面布局：R 平面、G 平面、B 平面
    assert_eq!(data[1], 1.0);
    assert!((data[4 + 1] - 0.2).abs() < 1e-6);
    assert!((data[8 + 1] - 0.4).abs() < 1e-6);
    assert_eq!(data[0], 0.0);
  }

  #[test]
  fn test_encode_image_tensor_pads_short_axis() {
    let norm = Normalization {
      mean: [0.0; 3],
      std: [1.0; 3],
    };
    let frame = RgbaFrame::filled(Dimensions::new(4, 2), [255, 255, 255, 255]).unwrap();
    let tensor = encode_image_tensor(&frame, Dimensions::new(4, 4), &norm).unwrap();
    let red = &tensor.data()[..16];
    // 第 0 行和第 3 行为填充
    assert!(red[..4].iter().all(|&v| v == 0.0));
    assert!(red[4..12].iter().all(|&v| v == 1.0));
    assert!(red[12..].iter().all(|&v| v == 0.0));
  }

  #[test]
  fn test_encode_rgba_bytes_rejects_malformed() {
    let norm = Normalization::default();
    let target = Dimensions::square(8);
    assert!(matches!(
      encode_rgba_bytes(&[], Dimensions::new(1, 1), target, &norm),
      Err(CodecError::Encoding(_))
    ));
    assert!(matches!(
      encode_rgba_bytes(&[1, 2, 3], Dimensions::new(1, 1), target, &norm),
      Err(CodecError::Encoding(_))
    ));
    assert!(matches!(
      encode_rgba_bytes(&[0; 8], Dimensions::new(2, 2), target, &norm),
      Err(CodecError::Encoding(_))
    ));
    assert!(encode_rgba_bytes(&[0; 16], Dimensions::new(2, 2), target, &norm).is_ok());
  }

  #[test]
  fn test_encode_rejects_zero_target() {
    let frame = RgbaFrame::filled(Dimensions::new(2, 2), [0; 4]).unwrap();
    assert!(matches!(
      encode_image_tensor(&frame, Dimensions::new(0, 4), &Normalization::default()),
      Err(CodecError::InvalidDimensions(_))
    ));
  }

  #[test]
  fn test_decode_mask_tensor_binary() {
    let mask = Tensor::new("mask", vec![1, 1, 2, 2], vec![-1.0, 0.5, f32::NAN, 3.0]).unwrap();
    let frame = decode_mask_tensor(&mask, Dimensions::new(2, 2), &MaskStyle::default()).unwrap();
    let alphas: Vec<u8> = frame.alphas().collect();
    assert_eq!(alphas, vec![0, 255, 0, 255]);
    assert_eq!(&frame.pixel(1, 0)[..3], &[0, 114, 189]);
  }

  #[test]
  fn test_decode_mask_tensor_sigmoid() {
    let mask = Tensor::new("mask", vec![2], vec![0.0, 100.0]).unwrap();
    let style = MaskStyle {
      alpha: AlphaMode::Sigmoid,
      ..MaskStyle::default()
    };
    let frame = decode_mask_tensor(&mask, Dimensions::new(2, 1), &style).unwrap();
    assert_eq!(frame.alpha(0, 0), 128);
    assert_eq!(frame.alpha(1, 0), 255);
  }

  #[test]
  fn test_decode_mask_tensor_length_mismatch_fails() {
    let mask = Tensor::new("mask", vec![1, 1, 2, 3], vec![0.0; 6]).unwrap();
    assert!(matches!(
      decode_mask_tensor(&mask, Dimensions::new(2, 2), &MaskStyle::default()),
      Err(CodecError::Decoding(_))
    ));
  }

  #[test]
  fn test_resize_alpha_nearest_upscale() {
    let mask = mask_frame(Dimensions::new(2, 1), &[0, 255]);
    let up = resize_alpha_buffer(&mask, mask.dims(), Dimensions::new(4, 2), ResizeFilter::Nearest)
      .unwrap();
    let alphas: Vec<u8> = up.alphas().collect();
    assert_eq!(alphas, vec![0, 0, 255, 255, 0, 0, 255, 255]);
  }

  #[test]
  fn test_resize_alpha_bilinear_softens_edges() {
    let mask = mask_frame(Dimensions::new(2, 1), &[0, 255]);
    let up = resize_alpha_buffer(&mask, mask.dims(), Dimensions::new(4, 1), ResizeFilter::Bilinear)
      .unwrap();
    let alphas: Vec<u8> = up.alphas().collect();
    assert_eq!(alphas[0], 0);
    assert_eq!(alphas[3], 255);
    assert!(alphas[1] > 0 && alphas[1] < alphas[2] && alphas[2] < 255);
  }

  #[test]
  fn test_resize_alpha_checks_source_dims() {
    let mask = mask_frame(Dimensions::new(2, 1), &[0, 255]);
    assert!(matches!(
      resize_alpha_buffer(
        &mask,
        Dimensions::new(3, 1),
        Dimensions::new(4, 4),
        ResizeFilter::Nearest
      ),
      Err(CodecError::DimensionMismatch { .. })
    ));
  }

  #[test]
  fn test_merge_alpha_buffers_takes_max() {
    let dims = Dimensions::new(3, 1);
    let a = mask_frame(dims, &[0, 200, 10]);
    let b = mask_frame(dims, &[50, 100, 10]);
    let merged = merge_alpha_buffers(&[a, b]).unwrap();
    assert_eq!(merged.alphas().collect::<Vec<_>>(), vec![50, 200, 10]);
  }

  #[test]
  fn test_merge_alpha_buffers_errors() {
    assert_eq!(merge_alpha_buffers(&[]), Err(CodecError::NothingToMerge));
    let a = mask_frame(Dimensions::new(1, 1), &[1]);
    let b = mask_frame(Dimensions::new(2, 1), &[1, 1]);
    assert!(matches!(
      merge_alpha_buffers(&[a, b]),
      Err(CodecError::DimensionMismatch { .. })
    ));
  }

  #[test]
  fn test_pad_to_square_centres_image() {
    let frame = RgbaFrame::filled(Dimensions::new(2, 4), [1, 1, 1, 255]).unwrap();
    let square = pad_to_square(&frame).unwrap();
    assert_eq!(square.dims(), Dimensions::square(4));
    assert_eq!(square.alpha(0, 0), 0);
    assert_eq!(square.alpha(1, 0), 255);
    assert_eq!(square.alpha(2, 3), 255);
    assert_eq!(square.alpha(3, 3), 0);
  }

  #[test]
  fn test_mask_to_prior_tensor() {
    let mask = mask_frame(Dimensions::new(4, 4), &[
      0, 0, 255, 255, //
      0, 0, 255, 255, //
      0, 0, 0, 0, //
      0, 0, 0, 0,
    ]);
    let prior = mask_to_prior_tensor(&mask, Dimensions::square(2)).unwrap();
    assert_eq!(prior.dims(), &[1, 1, 2, 2]);
    assert_eq!(prior.data(), &[0.0, 1.0, 0.0, 0.0]);
  }

  #[test]
  fn test_apply_mask_and_bounds() {
    let dims = Dimensions::new(3, 3);
    let image = RgbaFrame::filled(dims, [5, 6, 7, 255]).unwrap();
    let mask = mask_frame(dims, &[0, 0, 0, 0, 255, 128, 0, 0, 0]);
    let cut = apply_mask(&image, &mask).unwrap();
    assert_eq!(cut.pixel(1, 1), [5, 6, 7, 255]);
    assert_eq!(cut.alpha(2, 1), 128);
    assert_eq!(cut.alpha(0, 0), 0);

    let bounds = mask_bounds(&mask).unwrap();
    assert_eq!(
      bounds,
      MaskBounds {
        left: 1,
        top: 1,
        right: 2,
        bottom: 1
      }
    );
    assert_eq!(bounds.width(), 2);
    assert_eq!(bounds.height(), 1);
    assert!(mask_bounds(&RgbaFrame::transparent(dims).unwrap()).is_none());
  }

  #[test]
  fn test_overlay_mask_blends_colour() {
    let dims = Dimensions::new(2, 1);
    let image = RgbaFrame::filled(dims, [0, 0, 0, 255]).unwrap();
    let mask = RgbaFrame::new(dims, vec![100, 200, 50, 255, 100, 200, 50, 0]).unwrap();
    let out = overlay_mask(&image, &mask, 0.5).unwrap();
    assert_eq!(out.pixel(0, 0), [50, 100, 25, 255]);
    assert_eq!(out.pixel(1, 0), [0, 0, 0, 255]);
  }

  #[test]
  fn test_project_mask_drops_letterbox_padding() {
    // 4x2 图像在 4x4 掩码中占据第 1、2 行
    let mask = mask_frame(Dimensions::square(4), &[
      0, 0, 0, 0, //
      255, 255, 0, 0, //
      255, 255, 0, 0, //
      0, 0, 0, 0,
    ]);
    let projected = project_mask_to_image(&mask, Dimensions::new(4, 2)).unwrap();
    assert_eq!(projected.dims(), Dimensions::new(4, 2));
    assert_eq!(projected.alpha(0, 0), 255);
    assert_eq!(projected.alpha(0, 1), 255);
    assert_eq!(projected.alpha(3, 0), 0);

    let square = project_mask_to_image(&mask, Dimensions::square(4)).unwrap();
    assert_eq!(square, mask);
  }
}
