//! Fixed command table for authenticated `/api` paths

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Logout,
    Poweroff,
    LuksAdd,
    LuksChange,
    LuksRemove,
    SetTime,
    FileList,
    FileUpload,
    FileDownload,
    FileDelete,
    FileMove,
    FileCopy,
    FileMkdir,
    FileExtract,
    FileCompress,
    FileEncrypt,
    FileDecrypt,
    FileSign,
    FileVerify,
    Ciphers,
    Keys,
    GenKey,
    UploadKey,
    KeyInfo,
    Version,
    Running,
}

const TABLE: &[(&str, Command)] = &[
    ("/api/auth/logout", Command::Logout),
    ("/api/auth/poweroff", Command::Poweroff),
    ("/api/luks/add", Command::LuksAdd),
    ("/api/luks/change", Command::LuksChange),
    ("/api/luks/remove", Command::LuksRemove),
    ("/api/config/time", Command::SetTime),
    ("/api/file/list", Command::FileList),
    ("/api/file/upload", Command::FileUpload),
    ("/api/file/download", Command::FileDownload),
    ("/api/file/delete", Command::FileDelete),
    ("/api/file/move", Command::FileMove),
    ("/api/file/copy", Command::FileCopy),
    ("/api/file/mkdir", Command::FileMkdir),
    ("/api/file/extract", Command::FileExtract),
    ("/api/file/compress", Command::FileCompress),
    ("/api/file/encrypt", Command::FileEncrypt),
    ("/api/file/decrypt", Command::FileDecrypt),
    ("/api/file/sign", Command::FileSign),
    ("/api/file/verify", Command::FileVerify),
    ("/api/crypto/ciphers", Command::Ciphers),
    ("/api/crypto/keys", Command::Keys),
    ("/api/crypto/gen_key", Command::GenKey),
    ("/api/crypto/upload_key", Command::UploadKey),
    ("/api/crypto/key_info", Command::KeyInfo),
    ("/api/status/version", Command::Version),
    ("/api/status/running", Command::Running),
];

impl Command {
    pub fn from_path(path: &str) -> Option<Self> {
        TABLE
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, cmd)| *cmd)
    }

    pub fn path(self) -> &'static str {
        TABLE
            .iter()
            .find(|(_, cmd)| *cmd == self)
            .map(|(p, _)| *p)
            .unwrap_or("/api")
    }

    pub fn all() -> impl Iterator<Item = Command> {
        TABLE.iter().map(|(_, cmd)| *cmd)
    }
}
