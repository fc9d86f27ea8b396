pub mod extract;
pub mod list;
pub mod pack;
pub mod verify;

#[derive(clap::Subcommand)]
pub enum ArchiveCommands {
    /// List the entries of a TMOD archive
    List(list::ListArgs),
    /// Extract a TMOD archive into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into a TMOD archive
    Pack(pack::PackArgs),
    /// Check the hash and every entry of a TMOD archive
    Verify(verify::VerifyArgs),
}

impl ArchiveCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            ArchiveCommands::List(list) => list.handle(),
            ArchiveCommands::Extract(extract) => extract.handle(),
            ArchiveCommands::Pack(pack) => pack.handle(),
            ArchiveCommands::Verify(verify) => verify.handle(),
        }
    }
}
