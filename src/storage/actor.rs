use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::constants::STORAGE_MAILBOX;
use crate::metainfo::{File, InfoHash};

use super::error::StorageError;

const PIECE_SUFFIX: &str = "piece";

enum StorageCommand {
    Activate {
        info_hash: InfoHash,
        dir_name: String,
        reply: oneshot::Sender<Result<(), StorageError>>,
    },
    Deactivate {
        info_hash: InfoHash,
    },
    ExistingPieces {
        info_hash: InfoHash,
        reply: oneshot::Sender<Result<BTreeSet<u32>, StorageError>>,
    },
    Store {
        info_hash: InfoHash,
        index: u32,
        data: Bytes,
        reply: oneshot::Sender<Result<(), StorageError>>,
    },
    Retrieve {
        info_hash: InfoHash,
        index: u32,
        reply: oneshot::Sender<Result<Bytes, StorageError>>,
    },
    Compose {
        info_hash: InfoHash,
        files: Vec<File>,
        reply: oneshot::Sender<Result<PathBuf, StorageError>>,
    },
}

/// Mailbox of the storage actor. Cloneable; one actor serves every
/// torrent under one base directory.
#[derive(Clone)]
pub struct StorageHandle {
    tx: mpsc::Sender<StorageCommand>,
}

impl StorageHandle {
    /// Registers a torrent's piece directory, creating it when absent.
    pub async fn activate(
        &self,
        info_hash: InfoHash,
        dir_name: String,
    ) -> Result<(), StorageError> {
        let (reply, rx) = oneshot::channel();
        self.send(StorageCommand::Activate {
            info_hash,
            dir_name,
            reply,
        })
        .await;
        rx.await.unwrap_or(Err(StorageError::Unavailable))
    }

    pub async fn deactivate(&self, info_hash: InfoHash) {
        self.send(StorageCommand::Deactivate { info_hash }).await;
    }

    /// Piece indexes already on disk for this torrent.
    pub async fn existing_pieces(
        &self,
        info_hash: InfoHash,
    ) -> Result<BTreeSet<u32>, StorageError> {
        let (reply, rx) = oneshot::channel();
        self.send(StorageCommand::ExistingPieces { info_hash, reply })
            .await;
        rx.await.unwrap_or(Err(StorageError::Unavailable))
    }

    /// Submits a piece body for persistence. The returned receiver
    /// resolves when the write finishes; forward it into your mailbox
    /// rather than awaiting inline.
    pub async fn store(
        &self,
        info_hash: InfoHash,
        index: u32,
        data: Bytes,
    ) -> oneshot::Receiver<Result<(), StorageError>> {
        let (reply, rx) = oneshot::channel();
        self.send(StorageCommand::Store {
            info_hash,
            index,
            data,
            reply,
        })
        .await;
        rx
    }

    /// Requests a piece body from disk.
    pub async fn retrieve(
        &self,
        info_hash: InfoHash,
        index: u32,
    ) -> oneshot::Receiver<Result<Bytes, StorageError>> {
        let (reply, rx) = oneshot::channel();
        self.send(StorageCommand::Retrieve {
            info_hash,
            index,
            reply,
        })
        .await;
        rx
    }

    /// Assembles the stored pieces of a finished torrent into its final
    /// file layout. Returns the directory the files landed in.
    pub async fn compose(
        &self,
        info_hash: InfoHash,
        files: Vec<File>,
    ) -> Result<PathBuf, StorageError> {
        let (reply, rx) = oneshot::channel();
        self.send(StorageCommand::Compose {
            info_hash,
            files,
            reply,
        })
        .await;
        rx.await.unwrap_or(Err(StorageError::Unavailable))
    }

    async fn send(&self, command: StorageCommand) {
        let _ = self.tx.send(command).await;
    }
}

/// The actor owning disk I/O for one base directory.
pub struct Storage {
    base_dir: PathBuf,
    dirs: HashMap<InfoHash, PathBuf>,
}

impl Storage {
    pub fn spawn(base_dir: PathBuf) -> StorageHandle {
        let (tx, rx) = mpsc::channel(STORAGE_MAILBOX);
        let storage = Storage {
            base_dir,
            dirs: HashMap::new(),
        };
        tokio::spawn(storage.run(rx));
        StorageHandle { tx }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<StorageCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                StorageCommand::Activate {
                    info_hash,
                    dir_name,
                    reply,
                } => {
                    let _ = reply.send(self.activate(info_hash, dir_name).await);
                }
                StorageCommand::Deactivate { info_hash } => {
                    self.dirs.remove(&info_hash);
                    debug!(%info_hash, "torrent deactivated");
                }
                StorageCommand::ExistingPieces { info_hash, reply } => {
                    let _ = reply.send(self.existing_pieces(info_hash).await);
                }
                StorageCommand::Store {
                    info_hash,
                    index,
                    data,
                    reply,
                } => {
                    let result = self.store(info_hash, index, &data).await;
                    if let Err(e) = &result {
                        warn!(%info_hash, index, error = %e, "piece store failed");
                    }
                    let _ = reply.send(result);
                }
                StorageCommand::Retrieve {
                    info_hash,
                    index,
                    reply,
                } => {
                    let _ = reply.send(self.retrieve(info_hash, index).await);
                }
                StorageCommand::Compose {
                    info_hash,
                    files,
                    reply,
                } => {
                    let _ = reply.send(self.compose(info_hash, &files).await);
                }
            }
        }
    }

    async fn activate(
        &mut self,
        info_hash: InfoHash,
        dir_name: String,
    ) -> Result<(), StorageError> {
        let dir = self.base_dir.join(dir_name);
        fs::create_dir_all(&dir).await?;
        debug!(%info_hash, dir = %dir.display(), "torrent activated");
        self.dirs.insert(info_hash, dir);
        Ok(())
    }

    fn dir(&self, info_hash: &InfoHash) -> Result<&PathBuf, StorageError> {
        self.dirs.get(info_hash).ok_or(StorageError::NotActivated)
    }

    fn piece_path(&self, info_hash: &InfoHash, index: u32) -> Result<PathBuf, StorageError> {
        Ok(self.dir(info_hash)?.join(format!("{index}.{PIECE_SUFFIX}")))
    }

    async fn existing_pieces(
        &self,
        info_hash: InfoHash,
    ) -> Result<BTreeSet<u32>, StorageError> {
        let dir = self.dir(&info_hash)?;
        let mut indexes = BTreeSet::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(&format!(".{PIECE_SUFFIX}")) {
                if let Ok(index) = stem.parse::<u32>() {
                    indexes.insert(index);
                }
            }
        }
        Ok(indexes)
    }

    async fn store(
        &self,
        info_hash: InfoHash,
        index: u32,
        data: &[u8],
    ) -> Result<(), StorageError> {
        let path = self.piece_path(&info_hash, index)?;
        // write to a sibling temp file first so a torn write never leaves
        // a corrupt `.piece` behind
        let tmp = path.with_extension("partial");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.sync_data().await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn retrieve(&self, info_hash: InfoHash, index: u32) -> Result<Bytes, StorageError> {
        let path = self.piece_path(&info_hash, index)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::PieceNotStored(index))
            }
            Err(e) => Err(e.into()),
        }
    }

    // Streams the piece files, in index order, into the torrent's final
    // file layout next to the piece directory.
    async fn compose(&self, info_hash: InfoHash, files: &[File]) -> Result<PathBuf, StorageError> {
        let dir = self.dir(&info_hash)?.clone();

        let mut next_index = 0u32;
        let mut piece = Bytes::new();
        let mut piece_offset = 0usize;

        for file in files {
            let path = dir.join(&file.path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            let mut out = fs::File::create(&path).await?;
            let mut remaining = file.length as usize;
            while remaining > 0 {
                if piece_offset == piece.len() {
                    piece = Bytes::from(fs::read(self.piece_path(&info_hash, next_index)?).await?);
                    if piece.is_empty() {
                        return Err(StorageError::PieceNotStored(next_index));
                    }
                    piece_offset = 0;
                    next_index += 1;
                }
                let take = remaining.min(piece.len() - piece_offset);
                out.write_all(&piece[piece_offset..piece_offset + take])
                    .await?;
                piece_offset += take;
                remaining -= take;
            }
            out.sync_data().await?;
        }

        Ok(dir)
    }
}
