use rand::Rng;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_SUFFIX_LENGTH: usize = 6;

/// Produces candidate referral codes. Uniqueness is the caller's concern.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self, organization_type: &str) -> String;
}

/// Three-letter prefix for an organization type; unknown types get `ORG`
pub fn code_prefix(organization_type: &str) -> &'static str {
    match organization_type.trim().to_lowercase().as_str() {
        "club" => "CLB",
        "academy" => "ACD",
        "trainer" => "TRN",
        "agent" => "AGT",
        _ => "ORG",
    }
}

/// Uniform draw from `[A-Z0-9]` using the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self, organization_type: &str) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..CODE_SUFFIX_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();

        format!("{}{}", code_prefix(organization_type), suffix)
    }
}
