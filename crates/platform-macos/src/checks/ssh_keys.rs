//! SSH key hygiene under `~/.ssh`: passphrases and key strength.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use compliance::{
    CheckState, Checkable, CommandRunner, EvalContext, Outcome, Precondition, Preferences,
};
use tracing::{debug, warn};

use super::command::{run_program, CheckText};

const KEYGEN_CANDIDATES: [&str; 2] = ["/opt/homebrew/bin/ssh-keygen", "/usr/bin/ssh-keygen"];

pub const SSH_KEYS_PASSPHRASE: CheckText = CheckText {
    id: "ef69f752-0e89-46e2-a644-310429ae5f45",
    pass: "SSH keys require a password",
    fail: "SSH key is missing a password",
};

pub const SSH_KEYS_STRENGTH: CheckText = CheckText {
    id: "b6aaec0f-d76c-429e-aecf-edab7f1ac400",
    pass: "SSH keys use strong encryption",
    fail: "SSH key is using weak encryption",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// File name without `.pub`.
    pub name: String,
    pub private: PathBuf,
    pub public: PathBuf,
}

/// Where keys live and how to inspect them.
pub struct SshEnvironment {
    ssh_dir: PathBuf,
    keygen: Option<PathBuf>,
    ignored: Vec<String>,
    runner: Arc<dyn CommandRunner>,
}

impl SshEnvironment {
    pub fn new(home: &Path, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            ssh_dir: home.join(".ssh"),
            keygen: KEYGEN_CANDIDATES
                .iter()
                .map(PathBuf::from)
                .find(|path| path.exists()),
            ignored: Vec::new(),
            runner,
        }
    }

    pub fn with_keygen(mut self, keygen: impl Into<PathBuf>) -> Self {
        self.keygen = Some(keygen.into());
        self
    }

    /// Key base names to skip.
    pub fn with_ignored(mut self, ignored: Vec<String>) -> Self {
        self.ignored = ignored;
        self
    }

    fn precondition(&self) -> Precondition {
        if self.keygen.is_none() {
            return Precondition::Unmet("ssh-keygen was not found".to_string());
        }
        if !self.ssh_dir.is_dir() {
            return Precondition::Unmet("No ~/.ssh directory".to_string());
        }
        Precondition::Met
    }

    /// Public keys with a matching private key, sorted by name.
    pub fn key_pairs(&self) -> std::io::Result<Vec<KeyPair>> {
        let mut pairs = Vec::new();
        for entry in fs::read_dir(&self.ssh_dir)? {
            let public = entry?.path();
            if public.extension().and_then(|ext| ext.to_str()) != Some("pub") {
                continue;
            }
            let Some(name) = public.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if self.ignored.iter().any(|ignored| ignored == name) {
                continue;
            }
            let private = public.with_extension("");
            if !private.is_file() {
                continue;
            }
            pairs.push(KeyPair {
                name: name.to_string(),
                private,
                public: public.clone(),
            });
        }
        pairs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pairs)
    }

    fn keygen(&self, args: &[&str]) -> std::io::Result<String> {
        let keygen = self
            .keygen
            .as_ref()
            .map(|path| path.display().to_string())
            .ok_or_else(|| std::io::Error::other("ssh-keygen was not found"))?;
        run_program(self.runner.as_ref(), &keygen, args)
    }

    /// A key is protected when an empty passphrase is rejected.
    fn has_passphrase(&self, pair: &KeyPair) -> bool {
        let path = pair.private.display().to_string();
        match self.keygen(&["-P", "", "-y", "-f", &path]) {
            Ok(output) => output.contains("incorrect passphrase supplied"),
            Err(err) => {
                warn!(key = %pair.name, error = %err, "ssh-keygen passphrase test failed");
                false
            }
        }
    }

    fn key_info(&self, pair: &KeyPair) -> Option<KeyInfo> {
        let path = pair.public.display().to_string();
        self.keygen(&["-l", "-f", &path])
            .ok()
            .and_then(|output| KeyInfo::parse(&output))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cipher {
    Ed25519,
    Ed25519Sk,
    Ecdsa,
    EcdsaSk,
    Dsa,
    Rsa,
}

impl Cipher {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "ED25519" => Self::Ed25519,
            "ED25519-SK" => Self::Ed25519Sk,
            "ECDSA" => Self::Ecdsa,
            "ECDSA-SK" => Self::EcdsaSk,
            "DSA" => Self::Dsa,
            _ => Self::Rsa,
        }
    }

    /// Minimum key size in bits considered strong for this algorithm.
    pub fn min_bits(self) -> u32 {
        match self {
            Self::Rsa => 2048,
            // unattainable: DSA keys are always weak
            Self::Dsa => 8192,
            Self::Ecdsa | Self::EcdsaSk => 521,
            Self::Ed25519 | Self::Ed25519Sk => 256,
        }
    }
}

/// One line of `ssh-keygen -l`: `<bits> <fingerprint> <comment> (<TYPE>)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub bits: u32,
    pub fingerprint: String,
    pub cipher: Cipher,
}

impl KeyInfo {
    pub fn parse(output: &str) -> Option<Self> {
        let parts: Vec<&str> = output.split_whitespace().collect();
        if parts.len() < 4 {
            return None;
        }
        let cipher = parts[parts.len() - 1].trim_matches(|c| c == '(' || c == ')');
        Some(Self {
            bits: parts[0].parse().ok()?,
            fingerprint: parts[1].to_string(),
            cipher: Cipher::parse(cipher),
        })
    }

    pub fn is_strong(&self) -> bool {
        self.bits >= self.cipher.min_bits()
    }
}

/// Every private key must be protected by a passphrase.
pub struct SshKeysPassphraseCheck {
    env: Arc<SshEnvironment>,
    unprotected: Mutex<Vec<PathBuf>>,
}

impl SshKeysPassphraseCheck {
    pub fn new(env: Arc<SshEnvironment>) -> Self {
        Self {
            env,
            unprotected: Mutex::new(Vec::new()),
        }
    }
}

impl Checkable for SshKeysPassphraseCheck {
    fn id(&self) -> &str {
        SSH_KEYS_PASSPHRASE.id
    }

    fn title_pass(&self) -> String {
        SSH_KEYS_PASSPHRASE.pass.to_string()
    }

    fn title_fail(&self) -> String {
        SSH_KEYS_PASSPHRASE.fail.to_string()
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        let pairs = match self.env.key_pairs() {
            Ok(pairs) => pairs,
            Err(err) => return Outcome::Error(format!("listing ssh keys failed: {}", err)),
        };
        let unprotected: Vec<PathBuf> = pairs
            .iter()
            .filter(|pair| !self.env.has_passphrase(pair))
            .map(|pair| pair.private.clone())
            .collect();
        debug!(keys = pairs.len(), unprotected = unprotected.len(), "ssh passphrases tested");
        let passed = unprotected.is_empty();
        *self
            .unprotected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = unprotected;
        Outcome::from_bool(passed)
    }

    fn detail(&self) -> String {
        let keys = self
            .unprotected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if keys.is_empty() {
            return "None".to_string();
        }
        keys.iter()
            .map(|key| format!("- {}", key.display()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn preconditions(&self, _preferences: &Preferences) -> Precondition {
        self.env.precondition()
    }
}

/// Every key must meet the minimum size for its algorithm.
pub struct SshKeysStrengthCheck {
    env: Arc<SshEnvironment>,
    weak_key: Mutex<Option<String>>,
}

impl SshKeysStrengthCheck {
    pub fn new(env: Arc<SshEnvironment>) -> Self {
        Self {
            env,
            weak_key: Mutex::new(None),
        }
    }

    fn weak_key(&self) -> Option<String> {
        self.weak_key
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Checkable for SshKeysStrengthCheck {
    fn id(&self) -> &str {
        SSH_KEYS_STRENGTH.id
    }

    fn title_pass(&self) -> String {
        SSH_KEYS_STRENGTH.pass.to_string()
    }

    fn title_fail(&self) -> String {
        SSH_KEYS_STRENGTH.fail.to_string()
    }

    /// The weak key's name is the stored detail, so the title survives a
    /// restart.
    fn title_for(&self, state: &CheckState) -> String {
        if state.last_verdict {
            return self.title_pass();
        }
        let name = state.detail.trim();
        if name.is_empty() || name == "None" {
            return self.title_fail();
        }
        format!("SSH key {} is using weak encryption", name)
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        let pairs = match self.env.key_pairs() {
            Ok(pairs) => pairs,
            Err(err) => return Outcome::Error(format!("listing ssh keys failed: {}", err)),
        };
        let weak = pairs.iter().find(|pair| match self.env.key_info(pair) {
            Some(info) => {
                debug!(key = %pair.name, bits = info.bits, cipher = ?info.cipher, "ssh key inspected");
                !info.is_strong()
            }
            None => {
                warn!(key = %pair.name, "could not read ssh key fingerprint");
                false
            }
        });
        let weak = weak.map(|pair| pair.name.clone());
        let passed = weak.is_none();
        *self
            .weak_key
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = weak;
        Outcome::from_bool(passed)
    }

    fn detail(&self) -> String {
        self.weak_key().unwrap_or_else(|| "None".to_string())
    }

    fn preconditions(&self, _preferences: &Preferences) -> Precondition {
        self.env.precondition()
    }
}

#[cfg(test)]
mod tests {
    use super::{Cipher, KeyInfo};

    #[test]
    fn parses_keygen_fingerprint_lines() {
        let info = KeyInfo::parse("256 SHA256:q0bVd1d8 me@laptop (ED25519)\n").expect("info");
        assert_eq!(info.bits, 256);
        assert_eq!(info.cipher, Cipher::Ed25519);
        assert!(info.is_strong());

        let sk = KeyInfo::parse("256 SHA256:xx no comment (ED25519-SK)").expect("info");
        assert_eq!(sk.cipher, Cipher::Ed25519Sk);

        assert!(KeyInfo::parse("id_rsa.pub is not a public key file.").is_none());
    }

    #[test]
    fn strength_thresholds_per_algorithm() {
        let weak_rsa = KeyInfo::parse("1024 SHA256:a c (RSA)").expect("info");
        assert!(!weak_rsa.is_strong());
        assert!(KeyInfo::parse("4096 SHA256:a c (RSA)").expect("info").is_strong());
        assert!(!KeyInfo::parse("1024 SHA256:a c (DSA)").expect("info").is_strong());
        assert!(!KeyInfo::parse("256 SHA256:a c (ECDSA)").expect("info").is_strong());
        assert!(KeyInfo::parse("521 SHA256:a c (ECDSA)").expect("info").is_strong());
    }
}
