//! Unit test modules.

mod ftms_codec_test;
mod speed_model_test;
mod workout_parser_test;
mod workout_timeline_test;
