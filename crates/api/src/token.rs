//! Admin tokens. The plaintext is handed to the quiz creator exactly once; only its Blake3 digest is stored.

use rand::RngCore;

/// Fresh plaintext token together with the digest to persist.
pub struct Issued {
    pub token: Box<str>,
    pub digest: Box<str>,
}

pub fn issue() -> Issued {
    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    let token = hex::encode(secret).into_boxed_str();
    let digest = digest(&token);
    Issued { token, digest }
}

pub fn digest(token: &str) -> Box<str> {
    blake3::hash(token.as_bytes()).to_hex().as_str().into()
}

/// Checks a presented token against a stored digest. The comparison of [`blake3::Hash`] runs in constant time.
pub fn verify(token: &str, digest: &str) -> bool {
    let Ok(expected) = blake3::Hash::from_hex(digest) else {
        return false;
    };
    blake3::hash(token.as_bytes()) == expected
}
