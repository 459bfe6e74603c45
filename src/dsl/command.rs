//! Command table: every symbol the evaluator understands.
//!
//! Commands are a closed set, so dispatch is a `match` over [`Command`] in
//! the evaluator rather than a map of closures.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Chunk,
    Chapter,
    Chat,
    Stack,
    Ffmpeg,
    Include,
    Introspection,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Chunk => "Chunk",
            Category::Chapter => "Chapter",
            Category::Chat => "Chat",
            Category::Stack => "Stack",
            Category::Ffmpeg => "Ffmpeg",
            Category::Include => "Include",
            Category::Introspection => "Introspection",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Input,
    Output,
    Chunk,
    Blur,
    Unfinished,
    Removed,
    Cut,
    Chapter,
    Chat,
    ChatOffset,
    NoChat,
    Dup,
    Over,
    Swap,
    Drop,
    Concat,
    VideoCodec,
    VideoBitrate,
    AudioCodec,
    AudioBitrate,
    Outf,
    Inf,
    Include,
    IncludeIfExists,
    Here,
    ChunkLocation,
    ChunkNumber,
    ChunkDuration,
}

impl Command {
    pub const ALL: &'static [Command] = &[
        Command::Input,
        Command::Output,
        Command::Chunk,
        Command::Blur,
        Command::Unfinished,
        Command::Removed,
        Command::Cut,
        Command::Chapter,
        Command::Chat,
        Command::ChatOffset,
        Command::NoChat,
        Command::Dup,
        Command::Over,
        Command::Swap,
        Command::Drop,
        Command::Concat,
        Command::VideoCodec,
        Command::VideoBitrate,
        Command::AudioCodec,
        Command::AudioBitrate,
        Command::Outf,
        Command::Inf,
        Command::Include,
        Command::IncludeIfExists,
        Command::Here,
        Command::ChunkLocation,
        Command::ChunkNumber,
        Command::ChunkDuration,
    ];

    /// Look up a command by the symbol that invokes it.
    pub fn from_name(name: &str) -> Option<Command> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Input => "input",
            Command::Output => "output",
            Command::Chunk => "chunk",
            Command::Blur => "blur",
            Command::Unfinished => "unfinished",
            Command::Removed => "removed",
            Command::Cut => "cut",
            Command::Chapter => "chapter",
            Command::Chat => "chat",
            Command::ChatOffset => "chat_offset",
            Command::NoChat => "no_chat",
            Command::Dup => "dup",
            Command::Over => "over",
            Command::Swap => "swap",
            Command::Drop => "drop",
            Command::Concat => "concat",
            Command::VideoCodec => "video_codec",
            Command::VideoBitrate => "video_bitrate",
            Command::AudioCodec => "audio_codec",
            Command::AudioBitrate => "audio_bitrate",
            Command::Outf => "outf",
            Command::Inf => "inf",
            Command::Include => "include",
            Command::IncludeIfExists => "include_if_exists",
            Command::Here => "here",
            Command::ChunkLocation => "chunk_location",
            Command::ChunkNumber => "chunk_number",
            Command::ChunkDuration => "chunk_duration",
        }
    }

    /// Stack effect in the usual `before -- after` notation.
    pub fn signature(self) -> &'static str {
        match self {
            Command::Input | Command::Output => "<path:String> --",
            Command::Chunk => "<start:Timestamp> <end:Timestamp> --",
            Command::Blur | Command::Unfinished | Command::Removed | Command::NoChat => "--",
            Command::Cut => "<pad:Timestamp> --",
            Command::Chapter => "<label:String> <timestamp:Timestamp> --",
            Command::Chat => "<path:String> --",
            Command::ChatOffset => "<start:Timestamp> <end:Timestamp> --",
            Command::Dup => "<a> -- <a> <a>",
            Command::Over => "<a> <b> -- <a> <b> <a>",
            Command::Swap => "<a> <b> -- <b> <a>",
            Command::Drop => "<a> --",
            Command::Concat => "<a:String> <b:String> -- <ab:String>",
            Command::VideoCodec | Command::AudioCodec => "<codec:String> --",
            Command::VideoBitrate | Command::AudioBitrate => "<bitrate:String> --",
            Command::Outf | Command::Inf => "<flag:String> --",
            Command::Include | Command::IncludeIfExists => "<path:String> --",
            Command::Here | Command::ChunkLocation | Command::ChunkNumber => "-- <String>",
            Command::ChunkDuration => "-- <Timestamp>",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Command::Input
            | Command::Output
            | Command::Chunk
            | Command::Blur
            | Command::Unfinished
            | Command::Removed
            | Command::Cut => Category::Chunk,
            Command::Chapter => Category::Chapter,
            Command::Chat | Command::ChatOffset | Command::NoChat => Category::Chat,
            Command::Dup | Command::Over | Command::Swap | Command::Drop | Command::Concat => {
                Category::Stack
            }
            Command::VideoCodec
            | Command::VideoBitrate
            | Command::AudioCodec
            | Command::AudioBitrate
            | Command::Outf
            | Command::Inf => Category::Ffmpeg,
            Command::Include | Command::IncludeIfExists => Category::Include,
            Command::Here
            | Command::ChunkLocation
            | Command::ChunkNumber
            | Command::ChunkDuration => Category::Introspection,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Command::Input => "Set the input video for the chunks defined after it",
            Command::Output => "Set the path of the final rendered video",
            Command::Chunk => "Define a chunk of the input video between two timestamps",
            Command::Blur => "Blur the previously defined chunk",
            Command::Unfinished => "Mark the previously defined chunk as not finished yet",
            Command::Removed => "Remove the previously defined chunk",
            Command::Cut => "Request a padded preview of the boundary after the previous chunk",
            Command::Chapter => "Declare a chapter inside the next defined chunk",
            Command::Chat => "Load the chat log of the input video",
            Command::ChatOffset => "Drop chat messages in a range and shift the later ones back",
            Command::NoChat => "Unload the chat log",
            Command::Dup => "Duplicate the top of the stack",
            Command::Over => "Copy the second element of the stack to the top",
            Command::Swap => "Swap the two top elements of the stack",
            Command::Drop => "Discard the top of the stack",
            Command::Concat => "Concatenate two strings",
            Command::VideoCodec => "Override the video codec passed to ffmpeg",
            Command::VideoBitrate => "Override the video bitrate passed to ffmpeg",
            Command::AudioCodec => "Override the audio codec passed to ffmpeg",
            Command::AudioBitrate => "Override the audio bitrate passed to ffmpeg",
            Command::Outf => "Pass an extra output flag to ffmpeg",
            Command::Inf => "Pass an extra input flag to ffmpeg",
            Command::Include => "Evaluate another markut file in the current context",
            Command::IncludeIfExists => "Like include, but do nothing if the file does not exist",
            Command::Here => "Push the location of this command as a string",
            Command::ChunkLocation => "Push the location of the previous chunk as a string",
            Command::ChunkNumber => "Push the index of the previous chunk as a string",
            Command::ChunkDuration => "Push the duration of the previous chunk",
        }
    }
}
