//! enft application: command handlers over the library

use anyhow::{bail, Context, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use std::fs;
use std::path::Path;

use super::commands::parse_path;
use crate::config::{EnftConfig, StrategyKind};
use crate::crypto::{
    decrypt_secret, derive_private_key, encrypt_secret, reencrypt_with_proof, verify_transfer,
    EncryptedSecret, Keypair, LockedValues, PrivateKey, PublicKey, Randomness, Secret,
    TransferBundle,
};
use crate::market::{MemoryIdentityStore, MemoryLedger, MemoryObjectStore, Relay};
use crate::obfuscation::{decode_image, deobfuscate, encode_png, obfuscate};
use crate::types::PartyId;

#[derive(Serialize)]
struct KeyOutput {
    private_key: String,
    public_key: String,
}

impl KeyOutput {
    fn from_keypair(keypair: &Keypair) -> Self {
        Self {
            private_key: keypair.private().to_hex().to_string(),
            public_key: keypair.public().to_hex(),
        }
    }
}

/// Main enft application
pub struct EnftApp {
    config: EnftConfig,
}

impl EnftApp {
    pub fn new(config: EnftConfig) -> Self {
        Self { config }
    }

    /// Load the configuration file if one is given, defaults otherwise
    pub fn from_config_path(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => EnftConfig::from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => EnftConfig::default(),
        };
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &EnftConfig {
        &self.config
    }

    fn strategy_or_default(&self, strategy: Option<StrategyKind>) -> StrategyKind {
        strategy.unwrap_or(self.config.obfuscation.default_strategy)
    }

    pub fn keygen(&self) -> Result<()> {
        let keypair = Keypair::generate().context("generating keypair")?;
        tracing::info!(public_key = %keypair.public().fingerprint(), "Generated keypair");
        print_json(&KeyOutput::from_keypair(&keypair))
    }

    pub fn derive_key(&self, seed_hex: &str, path: &str) -> Result<()> {
        let seed = hex::decode(seed_hex.trim()).context("seed is not valid hex")?;
        let path = parse_path(path).with_context(|| format!("invalid derivation path {:?}", path))?;
        let keypair = Keypair::from_private(derive_private_key(&seed, &path)?);
        print_json(&KeyOutput::from_keypair(&keypair))
    }

    pub fn secret(&self, public_key: &str) -> Result<()> {
        let public = PublicKey::from_hex(public_key).context("invalid public key")?;
        let secret = Secret::generate()?;
        let encrypted = encrypt_secret(&secret, &public, &Randomness::generate()?);
        println!("{}", encrypted.to_hex());
        Ok(())
    }

    pub fn obfuscate(
        &self,
        image_path: &Path,
        out: &Path,
        cipher: &Path,
        public_key: &str,
        strategy: Option<StrategyKind>,
        seed: Option<u64>,
    ) -> Result<()> {
        let public = PublicKey::from_hex(public_key).context("invalid public key")?;
        let image = decode_image(
            &fs::read(image_path)
                .with_context(|| format!("reading image {}", image_path.display()))?,
        )?;

        let kind = self.strategy_or_default(strategy);
        let mask = self.config.obfuscation.strategy_for(
            kind,
            image.width(),
            image.height(),
            seed.unwrap_or_else(|| OsRng.next_u64()),
        );

        let secret = Secret::generate()?;
        let encrypted = encrypt_secret(&secret, &public, &Randomness::generate()?);
        let asset = obfuscate(&image, &mask, &secret)?;
        drop(secret);

        write_file(out, &encode_png(&asset.image)?)?;
        write_file(cipher, &asset.locked.to_bytes())?;

        tracing::info!(strategy = %kind, masked = asset.masked, "Obfuscated {}", image_path.display());
        println!("{}", encrypted.to_hex());
        Ok(())
    }

    pub fn transfer(
        &self,
        prev: &str,
        private_key: &str,
        recipient: &str,
        bundle_path: Option<&Path>,
    ) -> Result<()> {
        let prev = EncryptedSecret::from_hex(prev).context("invalid encrypted secret")?;
        let sender = Keypair::from_private(
            PrivateKey::from_hex(private_key).context("invalid private key")?,
        );
        let recipient = PublicKey::from_hex(recipient).context("invalid recipient key")?;

        let bundle = reencrypt_with_proof(&prev, &sender, &recipient)?;
        let json = serde_json::to_string_pretty(&bundle)?;
        match bundle_path {
            Some(path) => {
                write_file(path, json.as_bytes())?;
                tracing::info!(to = %recipient.fingerprint(), "Wrote transfer bundle to {}", path.display());
                println!("{}", bundle.statement.new.to_hex());
            }
            None => println!("{}", json),
        }
        Ok(())
    }

    pub fn verify(&self, bundle_path: &Path) -> Result<()> {
        let raw = fs::read_to_string(bundle_path)
            .with_context(|| format!("reading bundle {}", bundle_path.display()))?;
        let bundle: TransferBundle =
            serde_json::from_str(&raw).context("bundle is not a valid transfer bundle")?;

        if !verify_transfer(&bundle.statement, &bundle.proof) {
            bail!("transfer proof does not verify");
        }
        println!("valid");
        Ok(())
    }

    pub fn deobfuscate(
        &self,
        image_path: &Path,
        cipher: &Path,
        encrypted_secret: &str,
        private_key: &str,
        out: &Path,
    ) -> Result<()> {
        let encrypted =
            EncryptedSecret::from_hex(encrypted_secret).context("invalid encrypted secret")?;
        let private = PrivateKey::from_hex(private_key).context("invalid private key")?;
        let image = decode_image(
            &fs::read(image_path)
                .with_context(|| format!("reading image {}", image_path.display()))?,
        )?;
        let locked = LockedValues::from_bytes(
            &fs::read(cipher).with_context(|| format!("reading {}", cipher.display()))?,
        )?;

        let secret = decrypt_secret(&encrypted, &private);
        let restored = deobfuscate(&image, &locked, &secret)
            .context("could not unlock the hidden pixels; wrong key or mismatched files")?;
        drop(secret);

        write_file(out, &encode_png(&restored)?)?;
        tracing::info!("Restored image written to {}", out.display());
        Ok(())
    }

    /// Publish as `seller`, transfer to `buyer`, reveal as `buyer`
    pub fn trade(
        &self,
        image_path: &Path,
        seller: &str,
        buyer: &str,
        strategy: Option<StrategyKind>,
        out: &Path,
    ) -> Result<()> {
        let bytes = fs::read(image_path)
            .with_context(|| format!("reading image {}", image_path.display()))?;
        let relay = Relay::new(
            MemoryIdentityStore::new(),
            MemoryObjectStore::new(self.config.storage.base_url.clone()),
            MemoryLedger::new(),
            self.config.clone(),
        );
        let (seller, buyer) = (PartyId::new(seller), PartyId::new(buyer));
        let name = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let listing = relay.publish(&seller, &name, &bytes, self.strategy_or_default(strategy))?;
        let receipt = relay.transfer(&listing.asset, &seller, &buyer)?;
        let revealed = relay.reveal(&listing.asset, &buyer)?;
        write_file(out, &revealed)?;

        print_json(&receipt)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new(tag: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "enft-app-{}-{}-{}",
                tag,
                std::process::id(),
                OsRng.next_u32()
            ));
            fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn path(&self, name: &str) -> PathBuf {
            self.0.join(name)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn sample_png(dir: &TempDir) -> (PathBuf, RgbaImage) {
        let image = RgbaImage::from_fn(10, 10, |x, y| Rgba([x as u8 * 20, y as u8 * 20, 7, 255]));
        let path = dir.path("in.png");
        fs::write(&path, encode_png(&image).unwrap()).unwrap();
        (path, image)
    }

    #[test]
    fn test_obfuscate_then_deobfuscate_files() {
        let dir = TempDir::new("roundtrip");
        let app = EnftApp::new(EnftConfig::default());
        let (input, original) = sample_png(&dir);
        let keypair = Keypair::generate().unwrap();

        // `obfuscate` only prints the encrypted secret, so build the inputs by hand
        let secret = Secret::generate().unwrap();
        let encrypted = encrypt_secret(&secret, keypair.public(), &Randomness::generate().unwrap());
        let mask = app
            .config()
            .obfuscation
            .strategy_for(StrategyKind::Cross, 10, 10, 0);
        let asset = obfuscate(&original, &mask, &secret).unwrap();
        write_file(&dir.path("obf.png"), &encode_png(&asset.image).unwrap()).unwrap();
        write_file(&dir.path("obf.cipher"), &asset.locked.to_bytes()).unwrap();

        app.deobfuscate(
            &dir.path("obf.png"),
            &dir.path("obf.cipher"),
            &encrypted.to_hex(),
            &keypair.private().to_hex(),
            &dir.path("out.png"),
        )
        .unwrap();
        let restored = decode_image(&fs::read(dir.path("out.png")).unwrap()).unwrap();
        assert_eq!(restored, original);

        app.obfuscate(
            &input,
            &dir.path("obf2.png"),
            &dir.path("obf2.cipher"),
            &keypair.public().to_hex(),
            Some(StrategyKind::Uniform),
            None,
        )
        .unwrap();
        assert!(dir.path("obf2.png").exists());
        assert!(dir.path("obf2.cipher").exists());
    }

    #[test]
    fn test_transfer_then_verify_bundle() {
        let dir = TempDir::new("transfer");
        let app = EnftApp::new(EnftConfig::default());
        let seller = Keypair::generate().unwrap();
        let buyer = Keypair::generate().unwrap();
        let secret = Secret::generate().unwrap();
        let prev = encrypt_secret(&secret, seller.public(), &Randomness::generate().unwrap());

        let bundle_path = dir.path("bundle.json");
        app.transfer(
            &prev.to_hex(),
            &seller.private().to_hex(),
            &buyer.public().to_hex(),
            Some(&bundle_path),
        )
        .unwrap();
        app.verify(&bundle_path).unwrap();

        let mut bundle: TransferBundle =
            serde_json::from_str(&fs::read_to_string(&bundle_path).unwrap()).unwrap();
        bundle.statement.recipient_public = *seller.public();
        fs::write(&bundle_path, serde_json::to_string(&bundle).unwrap()).unwrap();
        assert!(app.verify(&bundle_path).is_err());
    }

    #[test]
    fn test_trade_recovers_original() {
        let dir = TempDir::new("trade");
        let app = EnftApp::new(EnftConfig::default());
        let (input, original) = sample_png(&dir);

        app.trade(&input, "alice", "bob", Some(StrategyKind::Cross), &dir.path("bob.png"))
            .unwrap();
        let revealed = decode_image(&fs::read(dir.path("bob.png")).unwrap()).unwrap();
        assert_eq!(revealed, original);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(EnftApp::from_config_path(Some(Path::new("/nonexistent/enft.json"))).is_err());
        assert!(EnftApp::from_config_path(None).is_ok());
    }

    #[test]
    fn test_bad_key_material_is_reported() {
        let app = EnftApp::new(EnftConfig::default());
        assert!(app.secret("not hex").is_err());
        assert!(app.derive_key("00ff", "1/a").is_err());
        assert!(app.derive_key("00112233445566778899aabbccddeeff", "0/1").is_ok());
    }
}
