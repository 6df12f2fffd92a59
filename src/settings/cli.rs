use super::Parser;

#[derive(Parser, Debug)]
#[command(about = "Refresh-token store maintenance")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
}
