use crate::packet::Packet;
use rand::Rng;

/// Generate a random Request Authenticator (16 bytes) per RFC 2865 Section 3
pub fn generate_request_authenticator() -> [u8; 16] {
    let mut rng = rand::rng();
    let mut authenticator = [0u8; 16];
    rng.fill(&mut authenticator);
    authenticator
}

/// MD5(Code + ID + Length + `authenticator` + Attributes + Secret)
fn packet_digest(packet: &Packet, authenticator: &[u8; 16], secret: &[u8]) -> [u8; 16] {
    let length = packet.length();
    let mut data = Vec::with_capacity(length + secret.len());
    data.push(packet.code.as_u8());
    data.push(packet.identifier);
    data.extend_from_slice(&(length as u16).to_be_bytes());
    data.extend_from_slice(authenticator);
    for attr in &packet.attributes {
        data.push(attr.attr_type);
        data.push(attr.encoded_length() as u8);
        data.extend_from_slice(&attr.value);
    }
    data.extend_from_slice(secret);

    md5::compute(&data).0
}

/// Calculate Response Authenticator per RFC 2865 Section 3
///
/// Response Authenticator = MD5(Code + ID + Length + Request Authenticator + Attributes + Secret)
///
/// Used for every reply code: Access-Accept/Reject, Accounting-Response and
/// the CoA/Disconnect ACK/NAK family (RFC 5176 Section 2.3).
pub fn calculate_response_authenticator(
    packet: &Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> [u8; 16] {
    packet_digest(packet, request_authenticator, secret)
}

pub fn verify_response_authenticator(
    response: &Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> bool {
    let calculated = calculate_response_authenticator(response, request_authenticator, secret);
    response.authenticator == calculated
}

/// Calculate the Request Authenticator of an Accounting-Request (RFC 2866
/// Section 3), CoA-Request or Disconnect-Request (RFC 5176 Section 2.3).
///
/// The digest is taken with the authenticator field set to sixteen zero octets.
pub fn calculate_accounting_request_authenticator(packet: &Packet, secret: &[u8]) -> [u8; 16] {
    packet_digest(packet, &[0u8; 16], secret)
}

/// Verify the Request Authenticator of an Accounting, CoA or Disconnect request
pub fn verify_accounting_request_authenticator(packet: &Packet, secret: &[u8]) -> bool {
    packet.authenticator == calculate_accounting_request_authenticator(packet, secret)
}

/// Encrypt User-Password attribute per RFC 2865 Section 5.2
///
/// The password is padded with NULs to a multiple of 16 bytes, then XORed with
/// MD5(secret + request_authenticator) for the first block and
/// MD5(secret + previous ciphertext block) for each following block.
pub fn encrypt_user_password(password: &str, secret: &[u8], authenticator: &[u8; 16]) -> Vec<u8> {
    let mut padded = password.as_bytes().to_vec();
    let blocks = padded.len().div_ceil(16).max(1);
    padded.resize(blocks * 16, 0);

    let mut result = Vec::with_capacity(padded.len());
    let mut previous_block = *authenticator;

    for chunk in padded.chunks(16) {
        let hash = password_pad(secret, &previous_block);
        let mut encrypted_block = [0u8; 16];
        for (i, byte) in encrypted_block.iter_mut().enumerate() {
            *byte = chunk[i] ^ hash[i];
        }
        previous_block = encrypted_block;
        result.extend_from_slice(&encrypted_block);
    }

    result
}

/// Decrypt User-Password attribute per RFC 2865 Section 5.2
pub fn decrypt_user_password(
    encrypted: &[u8],
    secret: &[u8],
    authenticator: &[u8; 16],
) -> Result<String, String> {
    if encrypted.len() % 16 != 0 || encrypted.is_empty() {
        return Err("Invalid encrypted password length".to_string());
    }

    let mut result = Vec::with_capacity(encrypted.len());
    let mut previous_block: &[u8] = authenticator;

    for chunk in encrypted.chunks(16) {
        let hash = password_pad(secret, previous_block);
        result.extend(chunk.iter().zip(hash.iter()).map(|(c, h)| c ^ h));
        previous_block = chunk;
    }

    while result.last() == Some(&0) {
        result.pop();
    }

    String::from_utf8(result).map_err(|e| format!("Invalid UTF-8 in password: {}", e))
}

fn password_pad(secret: &[u8], previous_block: &[u8]) -> [u8; 16] {
    let mut data = Vec::with_capacity(secret.len() + 16);
    data.extend_from_slice(secret);
    data.extend_from_slice(previous_block);
    md5::compute(&data).0
}
