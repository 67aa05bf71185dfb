use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use k1sig_cpu::{generate_keypair, sign_batch, verify_all, SignJob, VerifyJob};
use k1sig_crypto::sha256;
use k1sig_ecdsa::{
    Context, ECPrivKey, ECPubKey, Rfc6979NonceFunction, SecpECDSASignature,
    SecpRecoverableECDSASignature,
};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Messages per batch in benchmark mode.
const BENCH_CHUNK: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "k1sig", about = "secp256k1 ECDSA keys, signatures and verification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a random key pair
    Keygen {
        /// Print the public key uncompressed (65 bytes)
        #[arg(long, default_value_t = false)]
        uncompressed: bool,

        /// Also print the private key as SEC1 DER
        #[arg(long, default_value_t = false)]
        der: bool,
    },

    /// Derive the public key of a private key
    Pubkey {
        /// Private key, 32 bytes hex
        #[arg(long)]
        key: String,

        #[arg(long, default_value_t = false)]
        uncompressed: bool,
    },

    /// Sign a message digest
    Sign {
        /// Private key, 32 bytes hex
        #[arg(long)]
        key: String,

        #[command(flatten)]
        msg: MessageArgs,

        /// 32 bytes hex mixed into the RFC 6979 nonce
        #[arg(long = "extra-entropy")]
        extra_entropy: Option<String>,

        /// Print DER instead of the 64-byte compact form
        #[arg(long, default_value_t = false)]
        der: bool,

        /// Also print the recovery id
        #[arg(long, default_value_t = false)]
        recoverable: bool,
    },

    /// Verify a signature (compact or DER, detected by length)
    Verify {
        /// Public key in SEC1 hex
        #[arg(long)]
        pubkey: String,

        /// Signature hex
        #[arg(long)]
        sig: String,

        #[command(flatten)]
        msg: MessageArgs,
    },

    /// Recover the public key from a compact signature and recovery id
    Recover {
        /// 64-byte compact signature hex
        #[arg(long)]
        sig: String,

        #[arg(long)]
        recid: u8,

        #[command(flatten)]
        msg: MessageArgs,
    },

    /// Measure signing and verification throughput
    Bench {
        /// Number of signatures to produce and verify
        #[arg(long, default_value_t = 10_000)]
        iters: usize,

        /// Worker threads (default: all cores)
        #[arg(long)]
        threads: Option<usize>,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct MessageArgs {
    /// 32-byte digest hex, signed as is
    #[arg(long)]
    digest: Option<String>,

    /// Text message, hashed with SHA-256 first
    #[arg(long)]
    message: Option<String>,
}

impl MessageArgs {
    fn digest32(&self) -> Result<[u8; 32]> {
        match (&self.digest, &self.message) {
            (Some(hex_digest), _) => parse_hex32(hex_digest, "digest"),
            (None, Some(text)) => Ok(sha256::digest(text.as_bytes())),
            (None, None) => bail!("either --digest or --message is required"),
        }
    }
}

fn parse_hex32(s: &str, what: &str) -> Result<[u8; 32]> {
    let bytes = parse_hex(s, what)?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| anyhow!("{what} must be 32 bytes, got {}", bytes.len()))
}

fn parse_hex(s: &str, what: &str) -> Result<Vec<u8>> {
    let trimmed = s.trim().trim_start_matches("0x");
    hex::decode(trimmed).with_context(|| format!("{what} is not valid hex"))
}

fn parse_signature(s: &str) -> Result<SecpECDSASignature> {
    let bytes = parse_hex(s, "signature")?;
    let sig = if bytes.len() == 64 {
        SecpECDSASignature::from_compact(&bytes)?
    } else {
        SecpECDSASignature::from_der(&bytes)?
    };
    Ok(sig)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context::instance();

    match cli.command {
        Command::Keygen { uncompressed, der } => {
            let pair = generate_keypair(&mut OsRng, &ctx)?;
            println!("Private key: {}", hex::encode(pair.private_key.to_bytes()?));
            println!(
                "Public key:  {}",
                hex::encode(pair.public_key.to_bytes(!uncompressed))
            );
            if der {
                println!(
                    "DER:         {}",
                    hex::encode(pair.private_key.to_der(!uncompressed)?)
                );
            }
        }

        Command::Pubkey { key, uncompressed } => {
            let key = ECPrivKey::create(&parse_hex32(&key, "key")?, &ctx)?;
            println!("{}", hex::encode(key.create_pub_key()?.to_bytes(!uncompressed)));
        }

        Command::Sign {
            key,
            msg,
            extra_entropy,
            der,
            recoverable,
        } => {
            let key = ECPrivKey::create(&parse_hex32(&key, "key")?, &ctx)?;
            let digest = msg.digest32()?;
            let nonce_fn = match extra_entropy {
                Some(extra) => {
                    Rfc6979NonceFunction::with_extra_data(parse_hex32(&extra, "extra entropy")?)
                }
                None => Rfc6979NonceFunction::new(),
            };
            let (sig, recid) = key
                .try_sign_ecdsa_with_recid(&digest, Some(&nonce_fn))
                .ok_or(k1sig_core::Error::NonceRejected)?;
            debug!(recid, "signed");

            if der {
                println!("{}", hex::encode(sig.to_der()));
            } else {
                println!("{}", hex::encode(sig.to_compact()));
            }
            if recoverable {
                println!("recid: {recid}");
            }
        }

        Command::Verify { pubkey, sig, msg } => {
            let pubkey = ECPubKey::create(&parse_hex(&pubkey, "public key")?, &ctx)?;
            let sig = parse_signature(&sig)?;
            let digest = msg.digest32()?;
            if !pubkey.sig_verify(&sig, &digest) {
                bail!("signature does not verify");
            }
            if !sig.is_low_s() {
                eprintln!("Warning: signature has high S");
            }
            println!("OK");
        }

        Command::Recover { sig, recid, msg } => {
            let bytes = parse_hex(&sig, "signature")?;
            let compact = SecpECDSASignature::from_compact(&bytes)?;
            let sig = SecpRecoverableECDSASignature::new(compact, recid)?;
            let pubkey = ECPubKey::recover(&ctx, &sig, &msg.digest32()?)?;
            println!("{}", hex::encode(pubkey.serialize_compressed()));
        }

        Command::Bench { iters, threads } => run_bench(&ctx, iters, threads)?,
    }

    Ok(())
}

fn run_bench(ctx: &Arc<Context>, iters: usize, threads: Option<usize>) -> Result<()> {
    if iters == 0 {
        bail!("--iters must be at least 1");
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    let pool = builder.build().context("failed to start worker threads")?;
    info!(threads = pool.current_num_threads(), iters, "starting benchmark");

    let pair = generate_keypair(&mut OsRng, ctx)?;
    let mut msgs = vec![[0u8; 32]; iters];
    for m in msgs.iter_mut() {
        OsRng.fill_bytes(m);
    }

    let bar = ProgressBar::new((iters * 2) as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    bar.set_message("signing");
    let start = Instant::now();
    let mut sigs = Vec::with_capacity(iters);
    for chunk in msgs.chunks(BENCH_CHUNK) {
        let jobs: Vec<SignJob> = chunk
            .iter()
            .map(|m| SignJob {
                key: &pair.private_key,
                msg32: *m,
            })
            .collect();
        sigs.extend(pool.install(|| sign_batch(&jobs))?);
        bar.inc(chunk.len() as u64);
    }
    let sign_secs = start.elapsed().as_secs_f64();

    bar.set_message("verifying");
    let start = Instant::now();
    let mut all_ok = true;
    for (chunk, sig_chunk) in msgs.chunks(BENCH_CHUNK).zip(sigs.chunks(BENCH_CHUNK)) {
        let jobs: Vec<VerifyJob> = chunk
            .iter()
            .zip(sig_chunk)
            .map(|(m, s)| VerifyJob {
                key: &pair.public_key,
                sig: *s,
                msg32: *m,
            })
            .collect();
        all_ok &= pool.install(|| verify_all(&jobs));
        bar.inc(chunk.len() as u64);
    }
    let verify_secs = start.elapsed().as_secs_f64();
    bar.finish_and_clear();

    if !all_ok {
        bail!("benchmark produced a signature that does not verify");
    }

    println!("Threads: {}", pool.current_num_threads());
    println!(
        "Sign:    {iters} in {sign_secs:.3}s ({:.0} sig/s)",
        iters as f64 / sign_secs.max(1e-9)
    );
    println!(
        "Verify:  {iters} in {verify_secs:.3}s ({:.0} sig/s)",
        iters as f64 / verify_secs.max(1e-9)
    );
    Ok(())
}

fn main() {
    init_tracing();
    if let Err(err) = run(Cli::parse()) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
