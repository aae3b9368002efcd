//! gRPC service implementation.
//!
//! A thin translation layer: requests are handed to the [`FileManager`]
//! façade, payloads are copied into generated response types, and engine
//! errors are mapped onto gRPC status codes. No caching or view logic
//! lives here.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use mefserve_core::RecordingMetadata;
use mefserve_decoder::DecoderError;
use mefserve_engine::{EngineError, FileManager};
use mefserve_proto::mefserve::{mef_serve_server::MefServe, *};

/// mefserve gRPC service implementation
pub struct MefServeService {
    manager: Arc<FileManager>,
}

impl MefServeService {
    pub fn new(manager: Arc<FileManager>) -> Self {
        Self { manager }
    }

    fn file_info(path: &str, metadata: &RecordingMetadata) -> FileInfoResponse {
        FileInfoResponse {
            file_path: path.to_string(),
            channels: metadata
                .channels
                .iter()
                .map(|c| ChannelInfo {
                    name: c.name.clone(),
                    sample_rate_hz: c.sample_rate_hz,
                })
                .collect(),
            start_us: metadata.start_us,
            end_us: metadata.end_us,
            duration_us: metadata.duration_us(),
        }
    }
}

/// Map an engine error onto the wire status taxonomy.
pub(crate) fn status_from(err: EngineError) -> Status {
    match err {
        EngineError::NotOpen(path) => Status::failed_precondition(format!("file not open: {path}")),
        EngineError::OutOfRange { .. } => Status::out_of_range(err.to_string()),
        EngineError::InvalidChannel(_) | EngineError::InvalidArgument(_) => {
            Status::invalid_argument(err.to_string())
        }
        // Retryable: the view changed or the file closed underneath the
        // request.
        EngineError::Invalidated => Status::aborted(err.to_string()),
        EngineError::Decoder(decoder_err) => match decoder_err {
            DecoderError::NotFound(_) => Status::not_found(decoder_err.to_string()),
            DecoderError::Corrupt(_) => Status::data_loss(decoder_err.to_string()),
            DecoderError::Io(_) => Status::unavailable(decoder_err.to_string()),
            DecoderError::Unsupported(_) => Status::unimplemented(decoder_err.to_string()),
        },
    }
}

#[tonic::async_trait]
impl MefServe for MefServeService {
    #[tracing::instrument(skip(self, request), fields(file = %request.get_ref().file_path))]
    async fn open_file(
        &self,
        request: Request<OpenFileRequest>,
    ) -> Result<Response<FileInfoResponse>, Status> {
        let req = request.into_inner();
        let metadata = self
            .manager
            .open_file(&req.file_path)
            .await
            .map_err(status_from)?;
        Ok(Response::new(Self::file_info(&req.file_path, &metadata)))
    }

    #[tracing::instrument(skip(self, request), fields(file = %request.get_ref().file_path))]
    async fn close_file(
        &self,
        request: Request<CloseFileRequest>,
    ) -> Result<Response<CloseFileResponse>, Status> {
        let req = request.into_inner();
        self.manager
            .close_file(&req.file_path)
            .await
            .map_err(status_from)?;
        Ok(Response::new(CloseFileResponse {}))
    }

    async fn list_open_files(
        &self,
        _request: Request<ListOpenFilesRequest>,
    ) -> Result<Response<ListOpenFilesResponse>, Status> {
        let file_paths = self
            .manager
            .list_open_files()
            .await
            .into_iter()
            .map(String::from)
            .collect();
        Ok(Response::new(ListOpenFilesResponse { file_paths }))
    }

    async fn get_file_info(
        &self,
        request: Request<GetFileInfoRequest>,
    ) -> Result<Response<FileInfoResponse>, Status> {
        let req = request.into_inner();
        let metadata = self
            .manager
            .get_file_info(&req.file_path)
            .await
            .map_err(status_from)?;
        Ok(Response::new(Self::file_info(&req.file_path, &metadata)))
    }

    #[tracing::instrument(skip(self, request), fields(file = %request.get_ref().file_path, seconds = request.get_ref().seconds))]
    async fn set_signal_segment_size(
        &self,
        request: Request<SetSignalSegmentSizeRequest>,
    ) -> Result<Response<SegmentCountResponse>, Status> {
        let req = request.into_inner();
        let number_of_segments = self
            .manager
            .set_segment_seconds(&req.file_path, req.seconds)
            .await
            .map_err(status_from)?;
        Ok(Response::new(SegmentCountResponse { number_of_segments }))
    }

    async fn get_number_of_segments(
        &self,
        request: Request<GetNumberOfSegmentsRequest>,
    ) -> Result<Response<SegmentCountResponse>, Status> {
        let req = request.into_inner();
        let number_of_segments = self
            .manager
            .get_segment_count(&req.file_path)
            .await
            .map_err(status_from)?;
        Ok(Response::new(SegmentCountResponse { number_of_segments }))
    }

    #[tracing::instrument(skip(self, request), fields(file = %request.get_ref().file_path, channels = request.get_ref().channel_names.len()))]
    async fn set_active_channels(
        &self,
        request: Request<SetActiveChannelsRequest>,
    ) -> Result<Response<SetActiveChannelsResponse>, Status> {
        let req = request.into_inner();
        self.manager
            .set_active_channels(&req.file_path, req.channel_names)
            .await
            .map_err(status_from)?;
        Ok(Response::new(SetActiveChannelsResponse {}))
    }

    #[tracing::instrument(skip(self, request), fields(file = %request.get_ref().file_path, segment = request.get_ref().segment_index))]
    async fn get_signal_segment(
        &self,
        request: Request<GetSignalSegmentRequest>,
    ) -> Result<Response<SignalSegmentResponse>, Status> {
        let req = request.into_inner();
        let chunk = self
            .manager
            .get_signal_segment(&req.file_path, req.segment_index)
            .await
            .map_err(status_from)?;

        let (rows, cols) = chunk.shape();
        Ok(Response::new(SignalSegmentResponse {
            samples: chunk.data.samples().to_vec(),
            rows: rows as u32,
            cols: cols as u32,
            channel_names: chunk.channel_names.clone(),
            sample_rates: chunk.sample_rates.clone(),
            t_start_us: chunk.t_start_us,
            t_end_us: chunk.t_end_us,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn status_codes_follow_the_error_taxonomy() {
        let cases = [
            (
                status_from(EngineError::NotOpen("/x.mefd".into())),
                Code::FailedPrecondition,
            ),
            (
                status_from(EngineError::OutOfRange { index: 9, count: 5 }),
                Code::OutOfRange,
            ),
            (
                status_from(EngineError::InvalidChannel("Ch9".into())),
                Code::InvalidArgument,
            ),
            (
                status_from(EngineError::InvalidArgument("bad".into())),
                Code::InvalidArgument,
            ),
            (status_from(EngineError::Invalidated), Code::Aborted),
            (
                status_from(DecoderError::NotFound("/x".into()).into()),
                Code::NotFound,
            ),
            (
                status_from(DecoderError::Corrupt("crc".into()).into()),
                Code::DataLoss,
            ),
            (
                status_from(DecoderError::Io("disk".into()).into()),
                Code::Unavailable,
            ),
            (
                status_from(DecoderError::Unsupported("enc".into()).into()),
                Code::Unimplemented,
            ),
        ];
        for (status, expected) in cases {
            assert_eq!(status.code(), expected);
        }
    }
}
