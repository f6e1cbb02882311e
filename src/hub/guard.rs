use std::{cell::Cell, future::Future, marker::PhantomData};

use nazar_error::HubError;

thread_local! {
    /// Глубина текущей синхронной доставки на этом потоке (0 = вне доставки).
    static DISPATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
}

tokio::task_local! {
    /// Глубина публикации, внутри которой выполняется future асинхронного
    /// обработчика. Переживает `.await` и смену потока.
    static TASK_DEPTH: usize;
}

/// RAII-счётчик вложенности `publish`.
///
/// Действующая глубина равна большему из двух значений: глубины на потоке
/// (синхронные обработчики) и глубины задачи (future асинхронных
/// обработчиков, запущенные через [`scope`]). Guard выставляет глубину
/// потока и восстанавливает прежнее значение в `Drop`, в том числе при
/// раскрутке стека после паники обработчика. Guard не `Send`: он привязан
/// к потоку и не может пережить `.await`.
#[derive(Debug)]
pub(crate) struct DepthGuard {
    depth: usize,
    previous: usize,
    _not_send: PhantomData<*const ()>,
}

impl DepthGuard {
    /// Входит на следующий уровень вложенности или возвращает
    /// [`HubError::DispatchDepthExceeded`], не меняя счётчик.
    pub(crate) fn enter(limit: usize) -> Result<Self, HubError> {
        let depth = Self::current() + 1;
        if depth > limit {
            return Err(HubError::DispatchDepthExceeded { depth, limit });
        }
        Ok(Self::resume(depth))
    }

    /// Выставляет уже проверенную глубину на текущем потоке.
    pub(crate) fn resume(depth: usize) -> Self {
        let previous = DISPATCH_DEPTH.with(|d| d.replace(depth));
        Self {
            depth,
            previous,
            _not_send: PhantomData,
        }
    }

    /// Уровень, на который вошёл этот guard.
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Действующая глубина в текущем контексте.
    pub(crate) fn current() -> usize {
        let thread = DISPATCH_DEPTH.with(Cell::get);
        let task = TASK_DEPTH.try_with(|d| *d).unwrap_or(0);
        thread.max(task)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DISPATCH_DEPTH.with(|d| d.set(self.previous));
    }
}

/// Выполняет future обработчика на глубине `depth`: публикации изнутри
/// него получают `depth + 1`.
pub(crate) fn scope<F: Future>(
    depth: usize,
    fut: F,
) -> impl Future<Output = F::Output> {
    TASK_DEPTH.scope(depth, fut)
}
