// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 脚本可用的编码与加解密函数

use crate::utils::errors::CryptoError;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};
use base64::Engine as _;
use md5::{Digest, Md5};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Base64 编码
pub fn base64_encode(input: &str) -> String {
    STANDARD.encode(input.as_bytes())
}

/// Base64 解码为字节，兼容无填充和 URL 安全字母表
pub fn base64_decode_bytes(input: &str) -> Result<Vec<u8>, CryptoError> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(&cleaned)
        .or_else(|_| STANDARD_NO_PAD.decode(&cleaned))
        .or_else(|_| URL_SAFE.decode(&cleaned))
        .map_err(|e| CryptoError::Decode(e.to_string()))
}

/// Base64 解码为文本
pub fn base64_decode(input: &str) -> Result<String, CryptoError> {
    base64_decode_bytes(input).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// 十六进制编码
pub fn hex_encode(input: &str) -> String {
    hex::encode(input.as_bytes())
}

/// 十六进制解码为文本
pub fn hex_decode(input: &str) -> Result<String, CryptoError> {
    hex::decode(input.trim())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|e| CryptoError::Decode(e.to_string()))
}

/// 32位小写 MD5
pub fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// 16位 MD5，取32位结果的中间部分
pub fn md5_hex16(input: &str) -> String {
    md5_hex(input)[8..24].to_string()
}

/// AES-CBC 加密，PKCS7 填充，按密钥长度选择 128/192/256 位
pub fn aes_cbc_encrypt(plain: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let encrypted = match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, iv)
            .map_err(|_| CryptoError::InvalidLength)?
            .encrypt_padded_vec_mut::<Pkcs7>(plain),
        24 => Aes192CbcEnc::new_from_slices(key, iv)
            .map_err(|_| CryptoError::InvalidLength)?
            .encrypt_padded_vec_mut::<Pkcs7>(plain),
        32 => Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(|_| CryptoError::InvalidLength)?
            .encrypt_padded_vec_mut::<Pkcs7>(plain),
        _ => return Err(CryptoError::InvalidLength),
    };
    Ok(encrypted)
}

/// AES-CBC 解密
pub fn aes_cbc_decrypt(data: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(|_| CryptoError::InvalidLength)?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .map_err(|_| CryptoError::Unpad),
        24 => Aes192CbcDec::new_from_slices(key, iv)
            .map_err(|_| CryptoError::InvalidLength)?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .map_err(|_| CryptoError::Unpad),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|_| CryptoError::InvalidLength)?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .map_err(|_| CryptoError::Unpad),
        _ => Err(CryptoError::InvalidLength),
    }
}

/// 加密文本并输出 Base64
pub fn aes_encode_base64(text: &str, key: &str, iv: &str) -> Result<String, CryptoError> {
    aes_cbc_encrypt(text.as_bytes(), key.as_bytes(), iv.as_bytes()).map(|bytes| STANDARD.encode(bytes))
}

/// 解密 Base64 密文为文本
pub fn aes_decode_base64(data: &str, key: &str, iv: &str) -> Result<String, CryptoError> {
    let bytes = base64_decode_bytes(data)?;
    aes_cbc_decrypt(&bytes, key.as_bytes(), iv.as_bytes())
        .map(|plain| String::from_utf8_lossy(&plain).into_owned())
}
